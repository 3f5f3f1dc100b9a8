//! Subcommand run functions.
//!
//! Implements: REQ-CLI-001
//!
//! Each function opens the gate from the given configuration, runs one
//! operation, prints the outcome as JSON on stdout, and returns the
//! process exit code. A REJECTED execute outcome exits 1, the CLI
//! analogue of a forbidden response; infrastructure failures exit 2.

use serde_json::Value;
use tracing::error;

use permitgate_core::gate::Status;
use permitgate_core::{Gate, GateConfig, RequestContext};

use crate::cli::{ExecuteArgs, SubmitArgs, VerifyLedgerArgs};

/// Runs `permitgate submit`.
pub async fn run_submit(config: GateConfig, args: SubmitArgs) -> i32 {
    let mut context: RequestContext = match serde_json::from_str(&args.context) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("permitgate submit: invalid --context JSON: {err}");
            return 2;
        }
    };
    context.tools.extend(args.tools);

    let gate = match Gate::open(config) {
        Ok(gate) => gate,
        Err(err) => {
            error!(error = %err, "Gate startup failed");
            eprintln!("permitgate submit: {err}");
            return 2;
        }
    };

    match gate.submit(&args.request, &context).await {
        Ok(outcome) => {
            print_json(&outcome);
            0
        }
        Err(err) => {
            error!(error = %err, "Submit failed");
            eprintln!("permitgate submit: {err}");
            2
        }
    }
}

/// Runs `permitgate execute`.
pub async fn run_execute(config: GateConfig, args: ExecuteArgs) -> i32 {
    let payload: Value = match serde_json::from_str(&args.payload) {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("permitgate execute: invalid --payload JSON: {err}");
            return 2;
        }
    };

    let gate = match Gate::open(config) {
        Ok(gate) => gate,
        Err(err) => {
            error!(error = %err, "Gate startup failed");
            eprintln!("permitgate execute: {err}");
            return 2;
        }
    };

    match gate.execute(&args.permit_id, &args.tool, &payload).await {
        Ok(outcome) => {
            print_json(&outcome);
            if outcome.status == Status::Rejected { 1 } else { 0 }
        }
        Err(err) => {
            error!(error = %err, "Execute failed");
            eprintln!("permitgate execute: {err}");
            2
        }
    }
}

/// Runs `permitgate verify-ledger`.
pub async fn run_verify_ledger(config: GateConfig, _args: VerifyLedgerArgs) -> i32 {
    let gate = match Gate::open(config) {
        Ok(gate) => gate,
        Err(err) => {
            error!(error = %err, "Gate startup failed");
            eprintln!("permitgate verify-ledger: {err}");
            return 2;
        }
    };

    match gate.verify_ledger() {
        Ok(report) => {
            print_json(&report);
            if report.valid { 0 } else { 1 }
        }
        Err(err) => {
            error!(error = %err, "Ledger verification failed");
            eprintln!("permitgate verify-ledger: {err}");
            2
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("permitgate: output serialization failed: {err}"),
    }
}
