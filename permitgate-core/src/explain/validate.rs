//! Structural validation of raw explanation payloads.
//!
//! Implements: REQ-VAL-001/F-001
//!
//! The reasoning agent hands back untyped JSON. Validation walks the payload
//! in a fixed field order and reports the first violation found, so retry
//! loops and audit entries always carry one specific, stable reason. Only on
//! success is the payload decoded into a typed [`Explanation`].

use serde_json::Value;
use thiserror::Error;

use super::Explanation;

/// Top-level fields every explanation must carry, in check order.
const REQUIRED_FIELDS: [&str; 5] = [
    "decision",
    "rationale",
    "assumptions",
    "risks",
    "alternatives",
];

const SEVERITY_VALUES: [&str; 3] = ["LOW", "MEDIUM", "HIGH"];

/// A structural violation in an explanation payload.
///
/// Implements: REQ-VAL-001/§6.1
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload is not a JSON object.
    #[error("payload must be an object")]
    NotAnObject,

    /// A required top-level field is absent.
    #[error("missing required field: {field}")]
    MissingField {
        /// The absent field.
        field: &'static str,
    },

    /// `decision` is not a non-empty string.
    #[error("decision must be a non-empty string")]
    InvalidDecision,

    /// A string-list field is empty, not a list, or holds empty strings.
    #[error("{field} must be a non-empty list of non-empty strings")]
    InvalidStringList {
        /// The offending field.
        field: &'static str,
    },

    /// `risks` is not a non-empty list.
    #[error("risks must be a non-empty list")]
    RisksNotList,

    /// A risk entry is not an object.
    #[error("risk entries must be objects")]
    RiskEntryNotObject,

    /// A risk entry is missing a required key.
    #[error("risk entry missing: {key}")]
    RiskEntryMissing {
        /// The absent key.
        key: &'static str,
    },

    /// A risk entry key is present but not a string.
    #[error("risk entry field must be a string: {key}")]
    RiskFieldNotString {
        /// The offending key.
        key: &'static str,
    },

    /// `severity` is outside the LOW/MEDIUM/HIGH enum.
    #[error("invalid severity value")]
    InvalidSeverity,

    /// A HIGH-severity risk carries no mitigation.
    #[error("HIGH severity requires mitigation")]
    MissingMitigation,

    /// `alternatives` is not a non-empty list.
    #[error("alternatives must be a non-empty list")]
    AlternativesNotList,

    /// An alternative entry is not an object.
    #[error("alternative entries must be objects")]
    AlternativeEntryNotObject,

    /// An alternative entry is missing a required key.
    #[error("alternative entry missing: {key}")]
    AlternativeEntryMissing {
        /// The absent key.
        key: &'static str,
    },

    /// An alternative field is empty or not a string.
    #[error("alternative fields must be non-empty")]
    AlternativeFieldEmpty,

    /// An optional external schema check rejected the payload.
    #[error("schema validation failed: {reason}")]
    Schema {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// Payload passed structural checks but could not be decoded.
    #[error("explanation decode failed: {reason}")]
    Decode {
        /// Human-readable decode failure.
        reason: String,
    },
}

/// An optional external structural check, applied after the built-in ones.
///
/// Implements: REQ-VAL-001/F-002
///
/// The built-in checks are the mandatory contract; when no external check is
/// supplied, validation consists of them alone.
pub trait SchemaCheck: Send + Sync {
    /// Checks the payload, returning the first violation found.
    fn check(&self, payload: &Value) -> Result<(), ValidationError>;
}

/// Validates a raw payload against the explanation contract.
///
/// Implements: REQ-VAL-001/F-001
///
/// Checks run in a fixed order and the first violation is returned.
pub fn validate_payload(payload: &Value) -> Result<Explanation, ValidationError> {
    validate_payload_with(payload, None)
}

/// Validates a raw payload, then applies an optional external schema check.
///
/// Implements: REQ-VAL-001/F-001, F-002
pub fn validate_payload_with(
    payload: &Value,
    schema: Option<&dyn SchemaCheck>,
) -> Result<Explanation, ValidationError> {
    let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            return Err(ValidationError::MissingField { field });
        }
    }

    if !is_non_empty_string(&object["decision"]) {
        return Err(ValidationError::InvalidDecision);
    }

    check_string_list(&object["rationale"], "rationale")?;
    check_string_list(&object["assumptions"], "assumptions")?;
    check_risks(&object["risks"])?;
    check_alternatives(&object["alternatives"])?;

    if let Some(schema) = schema {
        schema.check(payload)?;
    }

    serde_json::from_value(payload.clone()).map_err(|err| ValidationError::Decode {
        reason: err.to_string(),
    })
}

fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

fn check_string_list(value: &Value, field: &'static str) -> Result<(), ValidationError> {
    let Some(items) = value.as_array() else {
        return Err(ValidationError::InvalidStringList { field });
    };
    if items.is_empty() || !items.iter().all(is_non_empty_string) {
        return Err(ValidationError::InvalidStringList { field });
    }
    Ok(())
}

fn check_risks(value: &Value) -> Result<(), ValidationError> {
    let Some(risks) = value.as_array() else {
        return Err(ValidationError::RisksNotList);
    };
    if risks.is_empty() {
        return Err(ValidationError::RisksNotList);
    }

    for risk in risks {
        let Some(entry) = risk.as_object() else {
            return Err(ValidationError::RiskEntryNotObject);
        };
        for key in ["risk", "severity", "mitigation"] {
            if !entry.contains_key(key) {
                return Err(ValidationError::RiskEntryMissing { key });
            }
        }
        for key in ["risk", "severity", "mitigation"] {
            if !entry[key].is_string() {
                return Err(ValidationError::RiskFieldNotString { key });
            }
        }
        let severity = entry["severity"].as_str().unwrap_or_default();
        if !SEVERITY_VALUES.contains(&severity) {
            return Err(ValidationError::InvalidSeverity);
        }
        let mitigation = entry["mitigation"].as_str().unwrap_or_default();
        if severity == "HIGH" && mitigation.trim().is_empty() {
            return Err(ValidationError::MissingMitigation);
        }
    }
    Ok(())
}

fn check_alternatives(value: &Value) -> Result<(), ValidationError> {
    let Some(alternatives) = value.as_array() else {
        return Err(ValidationError::AlternativesNotList);
    };
    if alternatives.is_empty() {
        return Err(ValidationError::AlternativesNotList);
    }

    for alternative in alternatives {
        let Some(entry) = alternative.as_object() else {
            return Err(ValidationError::AlternativeEntryNotObject);
        };
        for key in ["option", "why_not"] {
            if !entry.contains_key(key) {
                return Err(ValidationError::AlternativeEntryMissing { key });
            }
        }
        for key in ["option", "why_not"] {
            if !is_non_empty_string(&entry[key]) {
                return Err(ValidationError::AlternativeFieldEmpty);
            }
        }
    }
    Ok(())
}
