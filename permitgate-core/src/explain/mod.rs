//! Structured explanations and their validation contract.
//!
//! Implements: REQ-VAL-001
//!
//! An `Explanation` is the justification the reasoning agent produces for a
//! decision. It is validated structurally, then frozen; its canonical-form
//! digest becomes the permit's `decision_hash`, binding the approval to the
//! entire explanation rather than to the decision headline alone.

mod validate;

pub use validate::{SchemaCheck, ValidationError, validate_payload, validate_payload_with};

use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// Structured justification bound one-to-one to a decision.
///
/// Implements: REQ-VAL-001/§5.1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    /// The proposed action, as a short human-readable sentence.
    pub decision: String,
    /// Why the decision is sound, in order.
    pub rationale: Vec<String>,
    /// What the agent assumed, in order.
    pub assumptions: Vec<String>,
    /// Identified risks. HIGH-severity entries must carry a mitigation.
    pub risks: Vec<RiskEntry>,
    /// Alternatives considered and why they were not chosen.
    pub alternatives: Vec<Alternative>,
}

/// One identified risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskEntry {
    /// Description of the risk.
    pub risk: String,
    /// Severity classification.
    pub severity: RiskLevel,
    /// Mitigation. Required to be non-empty when severity is HIGH.
    pub mitigation: String,
}

/// One alternative that was considered and rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    /// The alternative option.
    pub option: String,
    /// Why it was not chosen.
    pub why_not: String,
}

impl Explanation {
    /// Digest of the canonical form; the permit binding key.
    ///
    /// Implements: REQ-HASH-001
    #[must_use]
    pub fn decision_hash(&self) -> String {
        crate::hashing::digest_hex(self)
    }

    /// Minimal placeholder used when validation retries are exhausted.
    ///
    /// Implements: REQ-ORCH-001/F-002.3
    ///
    /// Carries a single HIGH-severity risk with an empty mitigation so the
    /// payload itself reads as unreviewable; the submit path forces DENIED
    /// alongside it and never issues a permit.
    #[must_use]
    pub fn invalid_placeholder(decision: &str) -> Self {
        Self {
            decision: decision.to_string(),
            rationale: Vec::new(),
            assumptions: Vec::new(),
            risks: vec![RiskEntry {
                risk: "invalid explain payload".to_string(),
                severity: RiskLevel::High,
                mitigation: String::new(),
            }],
            alternatives: vec![Alternative {
                option: "manual review".to_string(),
                why_not: "validation failed".to_string(),
            }],
        }
    }
}
