//! Permit lifecycle: issuance, persistence, and execution-time verification.
//!
//! Implements: REQ-PRM-001
//!
//! A permit is a short-lived capability binding one approved explanation
//! (by decision hash) to one execution window. Permits are issued only
//! after policy evaluation passes, persisted to `permits.jsonl` only after
//! notarization succeeds, and checked again at execution time by the
//! [`ExecutionGuard`].

mod guard;
mod issuer;
mod store;

pub use guard::{ExecutionGuard, GuardRejection};
pub use issuer::PermitIssuer;
pub use store::{PERMITS_FILE, PermitStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

/// Placeholder transaction id carried between issuance and notarization.
pub const TX_PENDING: &str = "PENDING";

/// How a permit's notarization receipt was produced.
///
/// Implements: REQ-PRM-001/§5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotarizationMode {
    /// Simulated backend; transaction id is deterministic.
    Mock,
    /// External notarization backend.
    Real,
    /// Not yet notarized.
    Pending,
    /// Notarization was attempted and failed.
    Error,
}

/// A time-bounded execution capability for one approved decision.
///
/// Implements: REQ-PRM-001/§5.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permit {
    /// Unique permit identifier (UUID v4).
    pub permit_id: String,
    /// SHA-256 hex digest of the canonical approved explanation.
    pub decision_hash: String,
    /// Policy document version the approval was made under.
    pub policy_version: String,
    /// Risk level assessed at approval time.
    pub risk_level: RiskLevel,
    /// Issuance instant.
    pub issued_at: DateTime<Utc>,
    /// Instant after which the permit no longer authorizes execution.
    pub expires_at: DateTime<Utc>,
    /// Notarization transaction id, [`TX_PENDING`] until notarized.
    pub notarization_tx: String,
    /// How the transaction id was produced.
    pub notarization_mode: NotarizationMode,
}

impl Permit {
    /// Whether the permit has expired at `now`.
    ///
    /// The boundary is inclusive: a permit checked exactly at `expires_at`
    /// is still valid.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the permit has expired right now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
