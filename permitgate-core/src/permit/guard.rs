//! Execution-time permit verification.
//!
//! Implements: REQ-PRM-001/F-003

use chrono::{DateTime, Utc};
use tracing::debug;

use super::Permit;

/// Why a permit was rejected at execution time.
///
/// The display strings are the exact rejection reasons surfaced to callers
/// and recorded in the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    /// The permit's execution window has closed.
    Expired,
    /// The supplied decision does not hash to the permitted decision.
    HashMismatch,
}

impl std::fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => f.write_str("permit expired"),
            Self::HashMismatch => f.write_str("decision hash mismatch"),
        }
    }
}

/// Stateless verifier run immediately before any permitted side effect.
///
/// Implements: REQ-PRM-001/F-003
///
/// Expiry is checked before the hash so a stale permit is reported as
/// expired even when the decision also changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionGuard;

impl ExecutionGuard {
    /// Verifies the permit against the decision hash at `now`.
    pub fn verify_at(
        permit: &Permit,
        decision_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GuardRejection> {
        if permit.is_expired_at(now) {
            debug!(permit_id = %permit.permit_id, "Permit expired");
            return Err(GuardRejection::Expired);
        }
        if permit.decision_hash != decision_hash {
            debug!(permit_id = %permit.permit_id, "Decision hash mismatch");
            return Err(GuardRejection::HashMismatch);
        }
        Ok(())
    }

    /// Verifies the permit against the decision hash right now.
    pub fn verify(permit: &Permit, decision_hash: &str) -> Result<(), GuardRejection> {
        Self::verify_at(permit, decision_hash, Utc::now())
    }
}
