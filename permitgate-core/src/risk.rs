//! Risk classification shared by the policy engine, explanations, and permits.
//!
//! Implements: REQ-POL-001/§5.1

use serde::{Deserialize, Serialize};

/// Ordinal risk classification, LOW < MEDIUM < HIGH.
///
/// Within one policy evaluation the level is monotonically non-decreasing:
/// a HIGH reached by a blocklist match is never lowered by a later
/// require-approval match.
///
/// Implements: REQ-POL-001/§5.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// No rule matched.
    Low,
    /// A require-approval rule matched.
    Medium,
    /// A blocklist rule matched or an unregistered tool was requested.
    High,
}

impl RiskLevel {
    /// Raises the level to `other` if `other` is higher.
    #[must_use]
    pub fn escalate(self, other: RiskLevel) -> RiskLevel {
        self.max(other)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalate_is_monotonic() {
        assert_eq!(RiskLevel::Low.escalate(RiskLevel::Medium), RiskLevel::Medium);
        assert_eq!(RiskLevel::High.escalate(RiskLevel::Medium), RiskLevel::High);
        assert_eq!(RiskLevel::Medium.escalate(RiskLevel::Low), RiskLevel::Medium);
    }

    #[test]
    fn serde_uses_uppercase_wire_form() {
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"HIGH\"");
        let parsed: RiskLevel = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(parsed, RiskLevel::Medium);
    }
}
