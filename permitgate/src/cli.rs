//! CLI argument types for `permitgate` subcommands.
//!
//! Implements: REQ-CLI-001
//!
//! Defined separately from `main.rs` so integration tests can construct
//! them directly and drive the run functions without spawning a process.

use clap::Args;

/// Arguments for `permitgate submit`.
///
/// Runs one request through the full submit pipeline and prints the
/// outcome as JSON.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// The free-text request to authorize.
    pub request: String,

    /// Tool identifiers the request intends to use (repeatable).
    #[arg(long = "tool")]
    pub tools: Vec<String>,

    /// Additional context as a JSON object.
    #[arg(long, default_value = "{}")]
    pub context: String,
}

/// Arguments for `permitgate execute`.
///
/// Verifies a previously approved permit and dispatches one tool. A
/// REJECTED outcome exits non-zero.
#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// The permit to execute under.
    pub permit_id: String,

    /// The tool to dispatch: notarize_write, notify, or storage_append.
    pub tool: String,

    /// Tool payload as JSON.
    #[arg(long, default_value = "null")]
    pub payload: String,
}

/// Arguments for `permitgate verify-ledger`.
///
/// Recomputes the audit chain from the first entry and reports the first
/// corrupt line, if any.
#[derive(Args, Debug)]
pub struct VerifyLedgerArgs {}
