//! Exit-code contract of the CLI run functions.

use permitgate::cli::{ExecuteArgs, SubmitArgs, VerifyLedgerArgs};
use permitgate::run;
use permitgate_core::GateConfig;

fn config(dir: &std::path::Path) -> GateConfig {
    GateConfig::default()
        .with_data_dir(dir)
        .with_ledger_secret("test-secret")
}

fn submit_args(request: &str) -> SubmitArgs {
    SubmitArgs {
        request: request.to_string(),
        tools: Vec::new(),
        context: "{}".to_string(),
    }
}

#[tokio::test]
async fn submit_exits_zero_and_records_the_outcome() {
    let dir = tempfile::tempdir().expect("tempdir");
    let code = run::run_submit(config(dir.path()), submit_args("summarize the report")).await;
    assert_eq!(code, 0);
    assert!(dir.path().join("audit_log.jsonl").exists());
}

#[tokio::test]
async fn denied_submit_still_exits_zero() {
    // Denial is an outcome, not a CLI failure.
    let dir = tempfile::tempdir().expect("tempdir");
    let code = run::run_submit(config(dir.path()), submit_args("drop the table")).await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn malformed_context_json_exits_two() {
    let dir = tempfile::tempdir().expect("tempdir");
    let args = SubmitArgs {
        request: "summarize".to_string(),
        tools: Vec::new(),
        context: "{not json".to_string(),
    };
    let code = run::run_submit(config(dir.path()), args).await;
    assert_eq!(code, 2);
}

#[tokio::test]
async fn rejected_execute_exits_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let args = ExecuteArgs {
        permit_id: "never-issued".to_string(),
        tool: "notify".to_string(),
        payload: "null".to_string(),
    };
    let code = run::run_execute(config(dir.path()), args).await;
    assert_eq!(code, 1);
}

#[tokio::test]
async fn missing_ledger_secret_in_strict_mode_exits_two() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GateConfig::default().with_data_dir(dir.path());
    let code = run::run_submit(config, submit_args("summarize the report")).await;
    assert_eq!(code, 2);
}

#[tokio::test]
async fn verify_ledger_reports_corruption_with_exit_one() {
    let dir = tempfile::tempdir().expect("tempdir");

    let code = run::run_submit(config(dir.path()), submit_args("summarize the report")).await;
    assert_eq!(code, 0);
    let code = run::run_verify_ledger(config(dir.path()), VerifyLedgerArgs {}).await;
    assert_eq!(code, 0);

    let path = dir.path().join("audit_log.jsonl");
    let raw = std::fs::read_to_string(&path).expect("read");
    std::fs::write(&path, raw.replace("APPROVED", "EXECUTED")).expect("tamper");

    let code = run::run_verify_ledger(config(dir.path()), VerifyLedgerArgs {}).await;
    assert_eq!(code, 1);
}
