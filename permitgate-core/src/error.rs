//! Top-level gate error.

use thiserror::Error;

use crate::audit::LedgerError;
use crate::notarize::NotaryError;
use crate::storage::StorageError;

/// Infrastructure failures that escape the gate.
///
/// Policy, agent, notarization, and notification failures are classified
/// into terminal statuses inside the pipeline and never surface here; what
/// does surface is the gate's own durable state failing, at which point no
/// outcome can be recorded and the operation cannot complete.
#[derive(Debug, Error)]
pub enum GateError {
    /// Audit ledger construction or append failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Permit log or data directory failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The local notarization registry could not be opened.
    #[error(transparent)]
    Notary(#[from] NotaryError),
}
