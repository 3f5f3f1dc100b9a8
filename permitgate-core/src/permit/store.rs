//! Durable permit store with an in-memory index.
//!
//! Implements: REQ-PRM-001/F-002

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::Permit;
use crate::storage::{JsonlStore, StorageError};

/// Permit log file name inside the data directory.
pub const PERMITS_FILE: &str = "permits.jsonl";

/// Append-only permit log plus a concurrent id index.
///
/// Implements: REQ-PRM-001/F-002
///
/// The JSONL file is the source of truth; the index is rebuilt from it on
/// open. Re-persisting a permit id overwrites the indexed snapshot, so the
/// latest appended line for an id wins, matching replay order.
#[derive(Debug)]
pub struct PermitStore {
    store: Arc<JsonlStore>,
    index: DashMap<String, Permit>,
}

impl PermitStore {
    /// Opens the store, replaying `permits.jsonl` into the index.
    ///
    /// Malformed lines are skipped with a warning, never fatal.
    pub fn open(store: Arc<JsonlStore>) -> Result<Self, StorageError> {
        let index = DashMap::new();
        let mut skipped = 0usize;
        for line in store.read_all_lines(PERMITS_FILE)? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Permit>(&line) {
                Ok(permit) => {
                    index.insert(permit.permit_id.clone(), permit);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "Skipped malformed permit lines during replay");
        }
        debug!(permits = index.len(), "Permit store opened");
        Ok(Self { store, index })
    }

    /// Appends the permit to the log and indexes it.
    pub fn persist(&self, permit: &Permit) -> Result<(), StorageError> {
        self.store.append_line(PERMITS_FILE, permit)?;
        self.index.insert(permit.permit_id.clone(), permit.clone());
        Ok(())
    }

    /// Looks up a permit by id.
    #[must_use]
    pub fn get(&self, permit_id: &str) -> Option<Permit> {
        self.index.get(permit_id).map(|entry| entry.clone())
    }

    /// Number of indexed permits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the store holds no permits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
