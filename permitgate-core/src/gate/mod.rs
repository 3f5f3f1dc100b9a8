//! The orchestrator: submit and execute pipelines.
//!
//! Implements: REQ-ORCH-001
//!
//! One [`Gate`] value owns the whole pipeline: reasoning agent, explain
//! validation, policy engine, permit lifecycle, notarization, notification,
//! and the audit ledger. Every submit and every execute attempt ends in
//! exactly one terminal [`Status`] and exactly one ledger append; the
//! append is part of the operation's completion contract, not cleanup.

mod orchestrator;

pub use orchestrator::Gate;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::explain::Explanation;
use crate::permit::Permit;
use crate::policy::PolicyResult;

/// Terminal status of a gate operation.
///
/// Submit ends in `APPROVED`, `DENIED`, `HOLD`, or `ERROR`; execute ends
/// in `EXECUTED`, `REJECTED`, or `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Permit issued, notarized, and persisted.
    Approved,
    /// Policy violation or unrecoverable explanation failure.
    Denied,
    /// Needs a human: approval required or notarization failed.
    Hold,
    /// Execution refused before any side effect.
    Rejected,
    /// The permitted tool ran to completion.
    Executed,
    /// An internal step failed after checks passed.
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Hold => "HOLD",
            Self::Rejected => "REJECTED",
            Self::Executed => "EXECUTED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// The closed set of tools the execute path can dispatch.
///
/// Implements: REQ-ORCH-001/F-005
///
/// Parsed once at the boundary; an unknown name is rejected there and
/// never reaches dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Re-anchor the permit binding on the notarization backend.
    NotarizeWrite,
    /// Deliver the payload through the notification sink.
    Notify,
    /// Append the payload to the durable tool output log.
    StorageAppend,
}

impl ToolKind {
    /// The wire name of the tool.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotarizeWrite => "notarize_write",
            Self::Notify => "notify",
            Self::StorageAppend => "storage_append",
        }
    }
}

/// The requested tool name is not in the closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl std::fmt::Display for UnknownTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown tool: {}", self.0)
    }
}

impl std::error::Error for UnknownTool {}

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notarize_write" => Ok(Self::NotarizeWrite),
            "notify" => Ok(Self::Notify),
            "storage_append" => Ok(Self::StorageAppend),
            other => Err(UnknownTool(other.to_string())),
        }
    }
}

/// Outcome of one submit call, mirroring the audit entry's fields.
///
/// Implements: REQ-ORCH-001/§5.2
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    /// Generated request id.
    pub request_id: String,
    /// Terminal status.
    pub status: Status,
    /// Human-readable reason; present for every status except APPROVED.
    pub reason: Option<String>,
    /// The explanation that was recorded (placeholder when validation was
    /// exhausted); absent only when decision generation itself failed.
    pub explanation: Option<Explanation>,
    /// Policy evaluation result; absent when the pipeline never reached it.
    pub policy: Option<PolicyResult>,
    /// The persisted permit, on APPROVED only.
    pub permit: Option<Permit>,
}

/// Outcome of one execute call.
///
/// Implements: REQ-ORCH-001/§5.3
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteOutcome {
    /// The permit the caller presented.
    pub permit_id: String,
    /// The tool name as requested, before parsing.
    pub tool: String,
    /// Terminal status.
    pub status: Status,
    /// Human-readable reason; present for REJECTED and ERROR.
    pub reason: Option<String>,
    /// Tool-specific result, on EXECUTED only.
    pub tool_result: Option<Value>,
}

impl ExecuteOutcome {
    /// Whether the execution actually happened.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.status == Status::Executed
    }
}
