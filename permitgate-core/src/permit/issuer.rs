//! Permit issuance.
//!
//! Implements: REQ-PRM-001/F-001

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::info;
use uuid::Uuid;

use super::{NotarizationMode, Permit, TX_PENDING};
use crate::config::GateConfig;
use crate::explain::Explanation;
use crate::risk::RiskLevel;

/// Issues permits with a fixed time-to-live.
#[derive(Debug, Clone)]
pub struct PermitIssuer {
    ttl: Duration,
}

impl PermitIssuer {
    /// Issuer with the given permit TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Issuer using the configured TTL.
    #[must_use]
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.permit_ttl)
    }

    /// Issues a fresh permit bound to the explanation's decision hash.
    ///
    /// Implements: REQ-PRM-001/F-001
    ///
    /// The permit starts unnotarized: transaction id `PENDING`, mode
    /// `pending`. It must not be persisted or surfaced until notarization
    /// fills those in.
    #[must_use]
    pub fn issue(
        &self,
        explanation: &Explanation,
        policy_version: &str,
        risk_level: RiskLevel,
    ) -> Permit {
        let issued_at = Utc::now();
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::seconds(300));
        let permit = Permit {
            permit_id: Uuid::new_v4().to_string(),
            decision_hash: explanation.decision_hash(),
            policy_version: policy_version.to_string(),
            risk_level,
            issued_at,
            expires_at: issued_at + ttl,
            notarization_tx: TX_PENDING.to_string(),
            notarization_mode: NotarizationMode::Pending,
        };
        info!(
            permit_id = %permit.permit_id,
            risk_level = %permit.risk_level,
            policy_version = %permit.policy_version,
            "Issued permit"
        );
        permit
    }
}
