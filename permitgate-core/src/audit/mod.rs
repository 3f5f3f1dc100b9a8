//! Hash-chained, optionally signed audit ledger.
//!
//! Implements: REQ-AUD-001
//!
//! Every gate decision and execution attempt becomes one appended JSONL
//! entry. Entries form a singly linked hash chain: each carries the `hash`
//! of its predecessor as `prev_hash`, and its own `hash` is SHA-256 over
//! the predecessor hash concatenated with the canonical form of the entry
//! (timestamp and prev_hash included, hash and signature excluded). With a
//! ledger secret configured, an HMAC-SHA256 `signature` over the hash is
//! attached. Recomputing the chain from the first entry must reproduce
//! every stored hash; any disagreement indicates tampering.
//!
//! Appends are serialized behind a single mutex covering the whole
//! read-last-hash / compute / append critical section, so two entries can
//! never share a `prev_hash`.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use crate::config::GateConfig;
use crate::hashing::{canonical_json, sha256_hex};
use crate::storage::{JsonlStore, StorageError};

/// Ledger file name inside the data directory.
pub const AUDIT_LOG_FILE: &str = "audit_log.jsonl";

type HmacSha256 = Hmac<Sha256>;

/// Errors from the audit ledger.
///
/// Implements: REQ-AUD-001/§6.1
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Strict mode demands a signing secret and none is configured.
    ///
    /// Fatal at construction time: the gate must not start with a ledger
    /// that would silently downgrade from signed to unsigned.
    #[error("ledger signing secret is required in strict mode")]
    MissingSecret,

    /// The ledger mutex was poisoned by a panicking writer.
    #[error("ledger writer lock poisoned")]
    Lock,

    /// Underlying storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One immutable ledger record.
///
/// Payload fields are flattened at the top level next to the four
/// ledger-integrity fields.
///
/// Implements: REQ-AUD-001/§5.1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Arbitrary payload fields (request id, status, permit snapshot, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Unix seconds at append time.
    pub timestamp: i64,
    /// Hash of the immediately preceding entry; empty for the first entry.
    pub prev_hash: String,
    /// SHA-256 over `prev_hash ‖ canonical(entry without hash/signature)`.
    pub hash: String,
    /// HMAC-SHA256 of `hash` under the ledger secret, when configured.
    pub signature: Option<String>,
}

/// Result of a full-chain verification walk.
///
/// Implements: REQ-AUD-001/F-004
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    /// True iff every line parsed, chained, hashed, and verified.
    pub valid: bool,
    /// Number of entries examined.
    pub entries: usize,
    /// Index of the first invalid line, when any.
    pub first_invalid: Option<usize>,
    /// What was wrong with it.
    pub reason: Option<String>,
}

/// Append-only, hash-chained audit ledger over a JSONL file.
///
/// Implements: REQ-AUD-001
pub struct AuditLedger {
    store: Arc<JsonlStore>,
    secret: Option<Vec<u8>>,
    last_hash: Mutex<String>,
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

impl AuditLedger {
    /// Opens the ledger, recovering the last chain hash from disk.
    ///
    /// Implements: REQ-AUD-001/F-001, F-005
    ///
    /// Replay scans every line, tolerates and skips malformed ones, and
    /// seeds the in-memory chain head with the hash of the last well-formed
    /// entry. Fails when strict mode demands a secret that is missing.
    pub fn open(store: Arc<JsonlStore>, config: &GateConfig) -> Result<Self, LedgerError> {
        if config.ledger_secret.is_none() && config.strict && !config.allow_unsigned {
            return Err(LedgerError::MissingSecret);
        }

        let last_hash = Self::replay_last_hash(&store)?;
        Ok(Self {
            store,
            secret: config
                .ledger_secret
                .as_ref()
                .map(|s| s.as_bytes().to_vec()),
            last_hash: Mutex::new(last_hash),
        })
    }

    fn replay_last_hash(store: &JsonlStore) -> Result<String, LedgerError> {
        let mut last = String::new();
        let mut skipped = 0usize;
        for line in store.read_all_lines(AUDIT_LOG_FILE)? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(value) => {
                    if let Some(hash) = value.get("hash").and_then(Value::as_str) {
                        last = hash.to_string();
                    }
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "Skipped malformed ledger lines during replay");
        }
        Ok(last)
    }

    /// Returns the current chain head hash (empty before the first append).
    pub fn last_hash(&self) -> Result<String, LedgerError> {
        self.last_hash
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| LedgerError::Lock)
    }

    /// Appends one entry, durably, before returning it.
    ///
    /// Implements: REQ-AUD-001/F-002
    ///
    /// The mutex is held across read-hash / compute / write so concurrent
    /// appends never observe a stale `prev_hash`. The lock never spans an
    /// external call; only the in-memory and file critical section.
    pub fn append(&self, payload: Map<String, Value>) -> Result<AuditEntry, LedgerError> {
        let mut head = self.last_hash.lock().map_err(|_| LedgerError::Lock)?;

        let timestamp = Utc::now().timestamp();
        let prev_hash = head.clone();
        let hash = Self::compute_hash(&payload, timestamp, &prev_hash);
        let signature = self.sign(&hash);

        let entry = AuditEntry {
            fields: payload,
            timestamp,
            prev_hash,
            hash: hash.clone(),
            signature,
        };

        self.store.append_line(AUDIT_LOG_FILE, &entry)?;
        *head = hash;
        Ok(entry)
    }

    /// Hash over the previous hash and the canonical entry form.
    ///
    /// The entry form includes `timestamp` and `prev_hash`, excludes `hash`
    /// and `signature`.
    fn compute_hash(fields: &Map<String, Value>, timestamp: i64, prev_hash: &str) -> String {
        let mut body = fields.clone();
        body.insert("timestamp".to_string(), json!(timestamp));
        body.insert("prev_hash".to_string(), json!(prev_hash));

        let canonical = canonical_json(&Value::Object(body));
        let mut bytes = Vec::with_capacity(prev_hash.len() + canonical.len());
        bytes.extend_from_slice(prev_hash.as_bytes());
        bytes.extend_from_slice(canonical.as_bytes());
        sha256_hex(&bytes)
    }

    fn sign(&self, entry_hash: &str) -> Option<String> {
        self.secret.as_ref().map(|secret| {
            let mut mac = HmacSha256::new_from_slice(secret)
                .expect("HMAC-SHA256 accepts keys of any length");
            mac.update(entry_hash.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        })
    }

    /// Returns the most recent entry whose embedded permit snapshot carries
    /// the given permit id.
    ///
    /// Implements: REQ-AUD-001/F-003
    ///
    /// Linear scan from the start; malformed lines are skipped, not fatal.
    /// Execute entries reference permits by a bare `permit_id` field and are
    /// deliberately not matched, so lookups land on the approval record that
    /// holds the explanation and permit snapshot.
    pub fn find_latest_by_permit_id(
        &self,
        permit_id: &str,
    ) -> Result<Option<AuditEntry>, LedgerError> {
        let mut latest = None;
        for line in self.store.read_all_lines(AUDIT_LOG_FILE)? {
            let Ok(entry) = serde_json::from_str::<AuditEntry>(&line) else {
                continue;
            };
            let matches = entry
                .fields
                .get("permit")
                .and_then(|permit| permit.get("permit_id"))
                .and_then(Value::as_str)
                == Some(permit_id);
            if matches {
                latest = Some(entry);
            }
        }
        Ok(latest)
    }

    /// Walks the whole file from `prev_hash = ""`, recomputing every hash
    /// and signature.
    ///
    /// Implements: REQ-AUD-001/F-004
    ///
    /// Unlike replay, verification treats a malformed line as corruption.
    pub fn verify_chain(&self) -> Result<ChainReport, LedgerError> {
        let mut expected_prev = String::new();
        let mut entries = 0usize;

        for (index, line) in self.store.read_all_lines(AUDIT_LOG_FILE)?.iter().enumerate() {
            let entry: AuditEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(err) => {
                    return Ok(ChainReport {
                        valid: false,
                        entries,
                        first_invalid: Some(index),
                        reason: Some(format!("malformed line: {err}")),
                    });
                }
            };

            if entry.prev_hash != expected_prev {
                return Ok(ChainReport {
                    valid: false,
                    entries,
                    first_invalid: Some(index),
                    reason: Some("broken chain link".to_string()),
                });
            }

            let recomputed = Self::compute_hash(&entry.fields, entry.timestamp, &entry.prev_hash);
            if recomputed != entry.hash {
                return Ok(ChainReport {
                    valid: false,
                    entries,
                    first_invalid: Some(index),
                    reason: Some("stored hash does not match recomputation".to_string()),
                });
            }

            if self.secret.is_some() && self.sign(&entry.hash) != entry.signature {
                return Ok(ChainReport {
                    valid: false,
                    entries,
                    first_invalid: Some(index),
                    reason: Some("signature verification failed".to_string()),
                });
            }

            expected_prev = entry.hash;
            entries += 1;
        }

        Ok(ChainReport {
            valid: true,
            entries,
            first_invalid: None,
            reason: None,
        })
    }
}
