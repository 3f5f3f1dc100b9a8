//! End-to-end pipeline tests: submit and execute against a real data
//! directory, with failure injection at the agent, notary, and sink seams.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use permitgate_core::agent::{AgentError, ReasoningAgent, ScriptedAgent};
use permitgate_core::audit::AUDIT_LOG_FILE;
use permitgate_core::gate::Status;
use permitgate_core::notarize::{
    NotarizationReceipt, Notary, NotaryError, PermitRegistration, SimulatedNotary,
};
use permitgate_core::notify::{FileSink, NotificationSink, NotifyError};
use permitgate_core::permit::{NotarizationMode, PERMITS_FILE};
use permitgate_core::storage::JsonlStore;
use permitgate_core::{Gate, GateConfig, RequestContext, RiskLevel};

fn config(dir: &std::path::Path) -> GateConfig {
    GateConfig::default()
        .with_data_dir(dir)
        .with_ledger_secret("test-secret")
}

fn audit_lines(dir: &std::path::Path) -> Vec<Value> {
    let store = JsonlStore::open(dir).expect("store");
    store
        .read_all_lines(AUDIT_LOG_FILE)
        .expect("lines")
        .iter()
        .map(|line| serde_json::from_str(line).expect("parse"))
        .collect()
}

// ============================================================================
// Submit path
// ============================================================================

#[tokio::test]
async fn clean_request_is_approved_with_mock_notarization() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(config(dir.path())).expect("gate");

    let outcome = gate
        .submit("summarize the quarterly report", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Approved);
    assert!(outcome.reason.is_none());
    let policy = outcome.policy.expect("policy");
    assert!(policy.ok);
    assert!(!policy.engine_error);

    let permit = outcome.permit.expect("permit");
    assert_eq!(permit.decision_hash.len(), 64);
    assert_eq!(permit.notarization_mode, NotarizationMode::Mock);
    assert!(permit.notarization_tx.starts_with("MOCK_TX_"));
    assert!(gate.permits().get(&permit.permit_id).is_some());

    let entries = audit_lines(dir.path());
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry["status"], json!("APPROVED"));
    assert_eq!(entry["final_status"], json!("APPROVED"));
    assert_eq!(entry["permit"]["permit_id"], json!(permit.permit_id));
    assert_eq!(entry["notify_status"], json!("sent"));
    assert_eq!(entry["user_request"], json!("summarize the quarterly report"));
}

#[tokio::test]
async fn blocklisted_text_is_denied_without_a_permit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(config(dir.path())).expect("gate");

    let outcome = gate
        .submit("drop the production table", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Denied);
    let policy = outcome.policy.expect("policy");
    assert!(!policy.ok);
    assert!(!policy.violations.is_empty());
    assert_eq!(policy.risk_level, RiskLevel::High);
    assert!(outcome.permit.is_none());
    assert!(gate.permits().is_empty());

    let entries = audit_lines(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], json!("DENIED"));
}

#[tokio::test]
async fn approval_required_text_holds_without_a_permit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(config(dir.path())).expect("gate");

    let outcome = gate
        .submit("transfer the remaining balance", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Hold);
    assert_eq!(outcome.reason.as_deref(), Some("human approval required"));
    let policy = outcome.policy.expect("policy");
    assert!(policy.required_human_approval);
    assert!(policy.violations.is_empty());
    assert!(outcome.permit.is_none());
    assert!(gate.permits().is_empty());
}

struct RefusingNotary;

#[async_trait]
impl Notary for RefusingNotary {
    async fn write(
        &self,
        _registration: &PermitRegistration,
    ) -> Result<NotarizationReceipt, NotaryError> {
        Err(NotaryError::Backend {
            reason: "registry unreachable".to_string(),
        })
    }

    async fn get(&self, _permit_id: &str) -> Result<Option<PermitRegistration>, NotaryError> {
        Ok(None)
    }

    async fn is_valid(
        &self,
        _permit_id: &str,
        _decision_hash: &str,
        _now: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, NotaryError> {
        Ok(false)
    }
}

#[tokio::test]
async fn notarization_failure_degrades_to_hold_and_discards_the_permit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonlStore::open(dir.path()).expect("store"));
    let gate = Gate::with_components(
        config(dir.path()),
        Arc::new(ScriptedAgent),
        Arc::new(RefusingNotary),
        Arc::new(FileSink::new(store)),
    )
    .expect("gate");

    let outcome = gate
        .submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Hold);
    assert!(outcome
        .reason
        .as_deref()
        .expect("reason")
        .starts_with("notarization failed"));
    assert!(outcome.permit.is_none());
    assert!(gate.permits().is_empty());
    assert!(!dir.path().join(PERMITS_FILE).exists());

    let entries = audit_lines(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], json!("HOLD"));
    assert!(entries[0]["notarization"]["error"].is_string());
}

struct DivergingAgent;

#[async_trait]
impl ReasoningAgent for DivergingAgent {
    async fn generate_decision(
        &self,
        _request: &str,
        _context: &RequestContext,
    ) -> Result<String, AgentError> {
        Ok("Summarize the quarterly report".to_string())
    }

    async fn generate_explanation(
        &self,
        _request: &str,
        _decision: &str,
        _context: &RequestContext,
    ) -> Result<Value, AgentError> {
        // Structurally valid, but the decision the permit would bind to is
        // not the benign draft.
        Ok(json!({
            "decision": "Drop the production table",
            "rationale": ["cleanup"],
            "assumptions": ["table is unused"],
            "risks": [{
                "risk": "data loss",
                "severity": "LOW",
                "mitigation": "backup exists"
            }],
            "alternatives": [{
                "option": "archive instead",
                "why_not": "slower"
            }]
        }))
    }
}

#[tokio::test]
async fn policy_binds_to_the_explanation_decision_not_the_draft() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonlStore::open(dir.path()).expect("store"));
    let notary = SimulatedNotary::open(store.clone()).expect("notary");
    let gate = Gate::with_components(
        config(dir.path()),
        Arc::new(DivergingAgent),
        Arc::new(notary),
        Arc::new(FileSink::new(store)),
    )
    .expect("gate");

    let outcome = gate
        .submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit");

    // The blocklisted explanation decision is what would be hashed and
    // permitted; a benign draft must not clear it through policy.
    assert_eq!(outcome.status, Status::Denied);
    let policy = outcome.policy.expect("policy");
    assert_eq!(policy.violations, vec!["destructive operations are blocked"]);
    assert_eq!(policy.risk_level, RiskLevel::High);
    assert!(outcome.permit.is_none());
    assert!(gate.permits().is_empty());
}

struct InvalidExplainAgent {
    calls: AtomicUsize,
}

#[async_trait]
impl ReasoningAgent for InvalidExplainAgent {
    async fn generate_decision(
        &self,
        request: &str,
        _context: &RequestContext,
    ) -> Result<String, AgentError> {
        Ok(format!("Proceed with: {request}"))
    }

    async fn generate_explanation(
        &self,
        _request: &str,
        decision: &str,
        _context: &RequestContext,
    ) -> Result<Value, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Missing `alternatives`: always fails structural validation.
        Ok(json!({
            "decision": decision,
            "rationale": ["r"],
            "assumptions": [],
            "risks": []
        }))
    }
}

#[tokio::test]
async fn exhausted_explanation_attempts_deny_with_a_placeholder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonlStore::open(dir.path()).expect("store"));
    let notary = SimulatedNotary::open(store.clone()).expect("notary");
    let agent = Arc::new(InvalidExplainAgent {
        calls: AtomicUsize::new(0),
    });
    let gate = Gate::with_components(
        config(dir.path()),
        agent.clone(),
        Arc::new(notary),
        Arc::new(FileSink::new(store)),
    )
    .expect("gate");

    let outcome = gate
        .submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(agent.calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.status, Status::Denied);
    assert!(outcome.permit.is_none());

    // The audit record carries a synthesized HIGH-risk denial, not a
    // skipped evaluation.
    let policy = outcome.policy.expect("policy");
    assert!(!policy.ok);
    assert_eq!(policy.risk_level, RiskLevel::High);
    assert!(!policy.engine_error);
    assert!(policy.violations[0].starts_with("explanation rejected after 3 attempts"));

    let placeholder = outcome.explanation.expect("placeholder");
    assert_eq!(placeholder.risks.len(), 1);
    assert_eq!(placeholder.risks[0].risk, "invalid explain payload");
    assert_eq!(placeholder.risks[0].severity, RiskLevel::High);
    assert!(placeholder.risks[0].mitigation.is_empty());

    let entries = audit_lines(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], json!("DENIED"));
}

struct BrokenAgent;

#[async_trait]
impl ReasoningAgent for BrokenAgent {
    async fn generate_decision(
        &self,
        _request: &str,
        _context: &RequestContext,
    ) -> Result<String, AgentError> {
        Err(AgentError::Transport {
            reason: "model endpoint down".to_string(),
        })
    }

    async fn generate_explanation(
        &self,
        _request: &str,
        _decision: &str,
        _context: &RequestContext,
    ) -> Result<Value, AgentError> {
        unreachable!("decision generation already failed")
    }
}

#[tokio::test]
async fn decision_generation_failure_is_a_fatal_audited_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonlStore::open(dir.path()).expect("store"));
    let notary = SimulatedNotary::open(store.clone()).expect("notary");
    let gate = Gate::with_components(
        config(dir.path()),
        Arc::new(BrokenAgent),
        Arc::new(notary),
        Arc::new(FileSink::new(store)),
    )
    .expect("gate");

    let outcome = gate
        .submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Error);
    assert!(outcome
        .reason
        .as_deref()
        .expect("reason")
        .starts_with("decision generation failed"));
    assert!(outcome.explanation.is_none());
    assert!(outcome.permit.is_none());

    let entries = audit_lines(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], json!("ERROR"));
    assert!(entries[0]["explain"].is_null());
}

#[tokio::test]
async fn policy_engine_failure_denies_fail_closed_with_classification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(
        config(dir.path()).with_policy_path("/nonexistent/policy.json"),
    )
    .expect("gate");

    let outcome = gate
        .submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Denied);
    let policy = outcome.policy.expect("policy");
    assert!(policy.engine_error);
    assert_eq!(policy.risk_level, RiskLevel::High);
    assert!(policy.violations[0].starts_with("policy engine error"));
    assert!(outcome.permit.is_none());
}

struct DeafSink;

#[async_trait]
impl NotificationSink for DeafSink {
    async fn send(&self, _channel: &str, _payload: &Value) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery {
            reason: "sink offline".to_string(),
        })
    }
}

#[tokio::test]
async fn notification_failure_never_changes_the_outcome() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonlStore::open(dir.path()).expect("store"));
    let notary = SimulatedNotary::open(store).expect("notary");
    let gate = Gate::with_components(
        config(dir.path()),
        Arc::new(ScriptedAgent),
        Arc::new(notary),
        Arc::new(DeafSink),
    )
    .expect("gate");

    let outcome = gate
        .submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Approved);

    let entries = audit_lines(dir.path());
    assert_eq!(entries[0]["notify_status"], json!("failed"));
    assert!(entries[0]["notify_error"].is_string());
}

#[tokio::test]
async fn unregistered_context_tools_deny() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(config(dir.path())).expect("gate");

    let outcome = gate
        .submit(
            "summarize the report",
            &RequestContext::with_tools(["shell_exec"]),
        )
        .await
        .expect("submit");

    assert_eq!(outcome.status, Status::Denied);
    let policy = outcome.policy.expect("policy");
    assert_eq!(policy.violations, vec!["unregistered tools: shell_exec"]);
    assert_eq!(policy.risk_level, RiskLevel::High);
}

// ============================================================================
// Execute path
// ============================================================================

async fn approved_permit(gate: &Gate) -> permitgate_core::permit::Permit {
    gate.submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit")
        .permit
        .expect("permit")
}

#[tokio::test]
async fn execute_unknown_permit_is_rejected_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(config(dir.path())).expect("gate");

    let outcome = gate
        .execute("never-issued", "notify", &json!({"msg": "hi"}))
        .await
        .expect("execute");

    assert_eq!(outcome.status, Status::Rejected);
    assert_eq!(outcome.reason.as_deref(), Some("permit not found"));
    assert!(!outcome.ok());

    let entries = audit_lines(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], json!("REJECTED"));
    assert_eq!(entries[0]["action"], json!("execute"));
}

#[tokio::test]
async fn execute_with_unloaded_permit_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let permit_id = {
        let gate = Gate::open(config(dir.path())).expect("gate");
        approved_permit(&gate).await.permit_id
    };

    // Audit record survives; the permit log does not.
    std::fs::remove_file(dir.path().join(PERMITS_FILE)).expect("remove");

    let gate = Gate::open(config(dir.path())).expect("gate");
    let outcome = gate
        .execute(&permit_id, "notify", &Value::Null)
        .await
        .expect("execute");

    assert_eq!(outcome.status, Status::Rejected);
    assert_eq!(outcome.reason.as_deref(), Some("permit not loaded"));
}

#[tokio::test]
async fn execute_expired_permit_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(
        config(dir.path()).with_permit_ttl(Duration::from_secs(0)),
    )
    .expect("gate");

    let permit = approved_permit(&gate).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let outcome = gate
        .execute(&permit.permit_id, "notify", &Value::Null)
        .await
        .expect("execute");

    assert_eq!(outcome.status, Status::Rejected);
    assert_eq!(outcome.reason.as_deref(), Some("permit expired"));
}

#[tokio::test]
async fn execute_with_altered_explanation_is_rejected_hash_mismatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let permit_id = {
        let gate = Gate::open(config(dir.path())).expect("gate");
        approved_permit(&gate).await.permit_id
    };

    // Alter the recorded explanation without touching the permit.
    let audit_path = dir.path().join(AUDIT_LOG_FILE);
    let raw = std::fs::read_to_string(&audit_path).expect("read");
    let mut entry: Value = serde_json::from_str(raw.lines().next().expect("line")).expect("parse");
    entry["explain"]["decision"] = json!("Proceed with: something else entirely");
    std::fs::write(
        &audit_path,
        serde_json::to_string(&entry).expect("serialize") + "\n",
    )
    .expect("rewrite");

    let gate = Gate::open(config(dir.path())).expect("gate");
    let outcome = gate
        .execute(&permit_id, "notify", &Value::Null)
        .await
        .expect("execute");

    assert_eq!(outcome.status, Status::Rejected);
    assert_eq!(outcome.reason.as_deref(), Some("decision hash mismatch"));
}

#[tokio::test]
async fn execute_dispatches_each_known_tool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(config(dir.path())).expect("gate");

    for tool in ["storage_append", "notify", "notarize_write"] {
        let permit = approved_permit(&gate).await;
        let outcome = gate
            .execute(&permit.permit_id, tool, &json!({"via": tool}))
            .await
            .expect("execute");
        assert_eq!(outcome.status, Status::Executed, "tool {tool}");
        assert!(outcome.ok());
        assert!(outcome.tool_result.is_some());
    }
}

#[tokio::test]
async fn tool_failure_is_error_not_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonlStore::open(dir.path()).expect("store"));
    let notary = SimulatedNotary::open(store).expect("notary");
    let gate = Gate::with_components(
        config(dir.path()),
        Arc::new(ScriptedAgent),
        Arc::new(notary),
        Arc::new(DeafSink),
    )
    .expect("gate");

    let permit = approved_permit(&gate).await;
    let outcome = gate
        .execute(&permit.permit_id, "notify", &json!({"msg": "hi"}))
        .await
        .expect("execute");

    assert_eq!(outcome.status, Status::Error);
    assert!(outcome
        .reason
        .as_deref()
        .expect("reason")
        .starts_with("tool failed"));
    assert!(!outcome.ok());
}

// ============================================================================
// Ledger accounting
// ============================================================================

#[tokio::test]
async fn every_operation_appends_exactly_one_entry_and_the_chain_verifies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Gate::open(config(dir.path())).expect("gate");

    let approved = gate
        .submit("summarize the report", &RequestContext::default())
        .await
        .expect("submit");
    gate.submit("drop the table", &RequestContext::default())
        .await
        .expect("submit");
    gate.execute(
        &approved.permit.expect("permit").permit_id,
        "storage_append",
        &json!({"n": 1}),
    )
    .await
    .expect("execute");
    gate.execute("missing", "notify", &Value::Null)
        .await
        .expect("execute");

    let entries = audit_lines(dir.path());
    assert_eq!(entries.len(), 4);

    let report = gate.verify_ledger().expect("verify");
    assert!(report.valid, "{report:?}");
    assert_eq!(report.entries, 4);
}

#[tokio::test]
async fn chain_survives_gate_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let gate = Gate::open(config(dir.path())).expect("gate");
        gate.submit("summarize the report", &RequestContext::default())
            .await
            .expect("submit");
    }

    let gate = Gate::open(config(dir.path())).expect("gate");
    gate.submit("archive the minutes", &RequestContext::default())
        .await
        .expect("submit");

    let report = gate.verify_ledger().expect("verify");
    assert!(report.valid);
    assert_eq!(report.entries, 2);

    let entries = audit_lines(dir.path());
    assert_eq!(entries[1]["prev_hash"], entries[0]["hash"]);
}
