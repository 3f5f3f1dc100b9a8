//! Permit notarization.
//!
//! Implements: REQ-NOT-001
//!
//! Notarization anchors an issued permit in an external registry before it
//! becomes valid. The [`Notary`] trait exposes the registry's three
//! operations, which mirror the gate's own verification so a binding can
//! be checked without trusting the gate's local store. The default
//! [`SimulatedNotary`] keeps the registry in a local JSONL file with
//! deterministic transaction ids, so the rest of the pipeline exercises
//! the same code path a real backend would.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::permit::{NotarizationMode, Permit};
use crate::storage::{JsonlStore, StorageError};

/// Notary receipt log file name inside the data directory.
pub const NOTARY_TX_FILE: &str = "notary_tx.jsonl";

/// Errors from the notarization backend.
#[derive(Debug, Error)]
pub enum NotaryError {
    /// The backend refused or failed the registration.
    #[error("notarization backend unavailable: {reason}")]
    Backend {
        /// The underlying failure.
        reason: String,
    },

    /// The local receipt log failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The registry-side view of a permit.
///
/// Implements: REQ-NOT-001/§5.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermitRegistration {
    /// Permit identifier.
    pub permit_id: String,
    /// Decision hash the permit authorizes.
    pub decision_hash: String,
    /// Policy version the permit was approved under.
    pub policy_version: String,
    /// Issuance instant.
    pub issued_at: DateTime<Utc>,
    /// Registry-side validity horizon, mirroring the permit's expiry.
    pub expires_at: DateTime<Utc>,
}

impl PermitRegistration {
    /// Registration mirroring the given permit.
    #[must_use]
    pub fn from_permit(permit: &Permit) -> Self {
        Self {
            permit_id: permit.permit_id.clone(),
            decision_hash: permit.decision_hash.clone(),
            policy_version: permit.policy_version.clone(),
            issued_at: permit.issued_at,
            expires_at: permit.expires_at,
        }
    }
}

/// Proof that a registration was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotarizationReceipt {
    /// Backend transaction id.
    pub tx_id: String,
    /// How the id was produced.
    pub mode: NotarizationMode,
    /// When the backend accepted the registration.
    pub registered_at: DateTime<Utc>,
}

/// Permit registry operations.
///
/// Implements: REQ-NOT-001/§4
#[async_trait]
pub trait Notary: Send + Sync {
    /// Writes a permit binding to the registry, returning the receipt.
    async fn write(
        &self,
        registration: &PermitRegistration,
    ) -> Result<NotarizationReceipt, NotaryError>;

    /// Fetches a registration by permit id.
    async fn get(&self, permit_id: &str) -> Result<Option<PermitRegistration>, NotaryError>;

    /// Whether the permit is registered, bound to the given decision hash,
    /// and unexpired at `now`.
    ///
    /// Mirrors the gate's execution-time verification.
    async fn is_valid(
        &self,
        permit_id: &str,
        decision_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, NotaryError>;
}

/// Deterministic transaction id for the simulated backend.
///
/// `MOCK_TX_` followed by the first 24 characters of the permit id with
/// hyphens removed, so the same permit always notarizes to the same id.
#[must_use]
pub fn mock_tx_id(permit_id: &str) -> String {
    let compact: String = permit_id.chars().filter(|c| *c != '-').take(24).collect();
    format!("MOCK_TX_{compact}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NotaryRecord {
    registration: PermitRegistration,
    receipt: NotarizationReceipt,
}

/// Local file-backed registry standing in for an external notary.
///
/// Implements: REQ-NOT-001/F-001
#[derive(Debug)]
pub struct SimulatedNotary {
    store: Arc<JsonlStore>,
    index: DashMap<String, NotaryRecord>,
}

impl SimulatedNotary {
    /// Opens the simulated registry, replaying `notary_tx.jsonl`.
    pub fn open(store: Arc<JsonlStore>) -> Result<Self, NotaryError> {
        let index = DashMap::new();
        let mut skipped = 0usize;
        for line in store.read_all_lines(NOTARY_TX_FILE)? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<NotaryRecord>(&line) {
                Ok(record) => {
                    index.insert(record.registration.permit_id.clone(), record);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "Skipped malformed notary records during replay");
        }
        debug!(registrations = index.len(), "Simulated notary opened");
        Ok(Self { store, index })
    }
}

#[async_trait]
impl Notary for SimulatedNotary {
    async fn write(
        &self,
        registration: &PermitRegistration,
    ) -> Result<NotarizationReceipt, NotaryError> {
        let receipt = NotarizationReceipt {
            tx_id: mock_tx_id(&registration.permit_id),
            mode: NotarizationMode::Mock,
            registered_at: Utc::now(),
        };
        let record = NotaryRecord {
            registration: registration.clone(),
            receipt: receipt.clone(),
        };
        self.store.append_line(NOTARY_TX_FILE, &record)?;
        self.index.insert(registration.permit_id.clone(), record);
        info!(
            permit_id = %registration.permit_id,
            tx_id = %receipt.tx_id,
            "Permit notarized (simulated)"
        );
        Ok(receipt)
    }

    async fn get(&self, permit_id: &str) -> Result<Option<PermitRegistration>, NotaryError> {
        Ok(self
            .index
            .get(permit_id)
            .map(|record| record.registration.clone()))
    }

    async fn is_valid(
        &self,
        permit_id: &str,
        decision_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, NotaryError> {
        Ok(self
            .index
            .get(permit_id)
            .map(|record| {
                record.registration.decision_hash == decision_hash
                    && now <= record.registration.expires_at
            })
            .unwrap_or(false))
    }
}
