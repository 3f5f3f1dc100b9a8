//! Gate pipeline wiring and the submit/execute state machines.
//!
//! Implements: REQ-ORCH-001/F-001..F-006

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ExecuteOutcome, Status, SubmitOutcome, ToolKind};
use crate::agent::{ReasoningAgent, ScriptedAgent};
use crate::audit::{AuditLedger, ChainReport};
use crate::config::GateConfig;
use crate::context::RequestContext;
use crate::error::GateError;
use crate::explain::{Explanation, validate_payload};
use crate::hashing;
use crate::notarize::{Notary, PermitRegistration, SimulatedNotary};
use crate::notify::{FileSink, NotificationSink};
use crate::permit::{ExecutionGuard, PermitIssuer, PermitStore};
use crate::policy::{PolicyEngine, PolicyResult};
use crate::risk::RiskLevel;
use crate::storage::JsonlStore;

/// Total explanation attempts before degrading to the placeholder.
const EXPLANATION_ATTEMPTS: usize = 3;

/// Where the `storage_append` tool lands its payloads.
pub const TOOL_OUTPUT_FILE: &str = "tool_output.jsonl";

/// The assembled gate pipeline.
///
/// Implements: REQ-ORCH-001
pub struct Gate {
    store: Arc<JsonlStore>,
    ledger: AuditLedger,
    permits: PermitStore,
    policy: PolicyEngine,
    issuer: PermitIssuer,
    agent: Arc<dyn ReasoningAgent>,
    notary: Arc<dyn Notary>,
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").finish_non_exhaustive()
    }
}

impl Gate {
    /// Opens a self-contained gate: scripted agent, simulated notary, file
    /// notification sink. The development and CLI entry point; embedders
    /// with real backends use [`Gate::with_components`].
    pub fn open(config: GateConfig) -> Result<Self, GateError> {
        let store = Arc::new(JsonlStore::open(&config.data_dir)?);
        if !config.notary_simulate {
            warn!("No real notarization backend wired; using the simulated notary");
        }
        let notary: Arc<dyn Notary> = Arc::new(SimulatedNotary::open(store.clone())?);
        let sink: Arc<dyn NotificationSink> = Arc::new(FileSink::new(store.clone()));
        Self::assemble(config, store, Arc::new(ScriptedAgent), notary, sink)
    }

    /// Opens a gate over caller-supplied collaborators.
    pub fn with_components(
        config: GateConfig,
        agent: Arc<dyn ReasoningAgent>,
        notary: Arc<dyn Notary>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, GateError> {
        let store = Arc::new(JsonlStore::open(&config.data_dir)?);
        Self::assemble(config, store, agent, notary, sink)
    }

    fn assemble(
        config: GateConfig,
        store: Arc<JsonlStore>,
        agent: Arc<dyn ReasoningAgent>,
        notary: Arc<dyn Notary>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, GateError> {
        let ledger = AuditLedger::open(store.clone(), &config)?;
        let permits = PermitStore::open(store.clone())?;
        let policy = PolicyEngine::from_config(&config);
        let issuer = PermitIssuer::from_config(&config);
        Ok(Self {
            store,
            ledger,
            permits,
            policy,
            issuer,
            agent,
            notary,
            sink,
        })
    }

    /// The underlying audit ledger.
    #[must_use]
    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// The underlying permit store.
    #[must_use]
    pub fn permits(&self) -> &PermitStore {
        &self.permits
    }

    /// Recomputes the full audit chain.
    pub fn verify_ledger(&self) -> Result<ChainReport, GateError> {
        Ok(self.ledger.verify_chain()?)
    }

    // ========================================================================
    // Submit path
    // ========================================================================

    /// Runs one request through decision, explanation, policy, permit
    /// issuance, and notarization.
    ///
    /// Implements: REQ-ORCH-001/F-001..F-003
    ///
    /// Terminal states: APPROVED, DENIED, HOLD, ERROR. Exactly one audit
    /// entry is appended, after best-effort notification, before returning.
    pub async fn submit(
        &self,
        user_request: &str,
        context: &RequestContext,
    ) -> Result<SubmitOutcome, GateError> {
        let request_id = Uuid::new_v4().to_string();
        info!(request_id = %request_id, "Submit received");

        // Decision generation is single-attempt; its failure is fatal.
        let decision = match self.agent.generate_decision(user_request, context).await {
            Ok(decision) => decision,
            Err(err) => {
                error!(request_id = %request_id, error = %err, "Decision generation failed");
                let outcome = SubmitOutcome {
                    request_id,
                    status: Status::Error,
                    reason: Some(format!("decision generation failed: {err}")),
                    explanation: None,
                    policy: None,
                    permit: None,
                };
                return self.finish_submit(outcome, user_request, context, Value::Null).await;
            }
        };

        // Explanation: bounded retries, transport and validation failures
        // alike consume attempts.
        let mut explanation = None;
        let mut last_failure = String::new();
        for attempt in 1..=EXPLANATION_ATTEMPTS {
            match self
                .agent
                .generate_explanation(user_request, &decision, context)
                .await
            {
                Ok(payload) => match validate_payload(&payload) {
                    Ok(valid) => {
                        explanation = Some(valid);
                        break;
                    }
                    Err(err) => {
                        warn!(attempt, error = %err, "Explanation failed validation");
                        last_failure = err.to_string();
                    }
                },
                Err(err) => {
                    warn!(attempt, error = %err, "Explanation generation failed");
                    last_failure = err.to_string();
                }
            }
        }

        let Some(explanation) = explanation else {
            let reason = format!(
                "explanation rejected after {EXPLANATION_ATTEMPTS} attempts: {last_failure}"
            );
            // Synthesized fail-closed result so the audit record reads as a
            // HIGH-risk denial, not a skipped evaluation.
            let policy = PolicyResult {
                ok: false,
                violations: vec![reason.clone()],
                risk_level: RiskLevel::High,
                required_human_approval: false,
                engine_error: false,
            };
            let outcome = SubmitOutcome {
                request_id,
                status: Status::Denied,
                reason: Some(reason),
                explanation: Some(Explanation::invalid_placeholder(&decision)),
                policy: Some(policy),
                permit: None,
            };
            return self.finish_submit(outcome, user_request, context, Value::Null).await;
        };

        // Policy: an engine failure is a fail-closed denial, never a pass.
        // Evaluation binds to the explanation's decision, the exact text the
        // permit's hash will cover; the step-1 draft is never permitted and
        // must not be what the policy clears.
        let (policy, policy_version) = match self.policy.load() {
            Ok(document) => {
                let result =
                    PolicyEngine::evaluate_document(&document, &explanation.decision, context);
                (result, document.version)
            }
            Err(err) => {
                warn!(error = %err, "Policy engine failed; denying");
                (
                    PolicyResult::fail_closed(format!("policy engine error: {err}")),
                    String::new(),
                )
            }
        };

        let (status, reason, permit, notarization) = if !policy.violations.is_empty() {
            (
                Status::Denied,
                Some(policy.violations.join("; ")),
                None,
                Value::Null,
            )
        } else if policy.required_human_approval {
            (
                Status::Hold,
                Some("human approval required".to_string()),
                None,
                Value::Null,
            )
        } else {
            let mut permit = self
                .issuer
                .issue(&explanation, &policy_version, policy.risk_level);
            match self
                .notary
                .write(&PermitRegistration::from_permit(&permit))
                .await
            {
                Ok(receipt) => {
                    permit.notarization_tx = receipt.tx_id.clone();
                    permit.notarization_mode = receipt.mode;
                    self.permits.persist(&permit)?;
                    let notarization = json!({"tx_id": receipt.tx_id, "mode": receipt.mode});
                    (Status::Approved, None, Some(permit), notarization)
                }
                Err(err) => {
                    // The unnotarized permit is discarded, never persisted.
                    warn!(error = %err, "Notarization failed; holding");
                    (
                        Status::Hold,
                        Some(format!("notarization failed: {err}")),
                        None,
                        json!({"error": err.to_string()}),
                    )
                }
            }
        };

        let outcome = SubmitOutcome {
            request_id,
            status,
            reason,
            explanation: Some(explanation),
            policy: Some(policy),
            permit,
        };
        self.finish_submit(outcome, user_request, context, notarization).await
    }

    /// Notifies best-effort, then durably records the outcome.
    ///
    /// The ledger append is the operation's completion contract; only its
    /// failure can turn a classified outcome into an error.
    async fn finish_submit(
        &self,
        outcome: SubmitOutcome,
        user_request: &str,
        context: &RequestContext,
        notarization: Value,
    ) -> Result<SubmitOutcome, GateError> {
        let payload = json!({"request_id": outcome.request_id, "status": outcome.status});
        let notify_error = self
            .sink
            .send("audit", &payload)
            .await
            .err()
            .map(|err| err.to_string());
        if let Some(err) = &notify_error {
            warn!(error = %err, "Outcome notification failed");
        }

        let mut fields = Map::new();
        fields.insert("request_id".to_string(), json!(outcome.request_id));
        fields.insert("user_request".to_string(), json!(user_request));
        fields.insert("context".to_string(), hashing::to_canonical_value(context));
        fields.insert(
            "explain".to_string(),
            outcome
                .explanation
                .as_ref()
                .map(hashing::to_canonical_value)
                .unwrap_or(Value::Null),
        );
        fields.insert(
            "policy".to_string(),
            outcome
                .policy
                .as_ref()
                .map(hashing::to_canonical_value)
                .unwrap_or(Value::Null),
        );
        fields.insert("status".to_string(), json!(outcome.status));
        fields.insert("final_status".to_string(), json!(outcome.status));
        fields.insert("reason".to_string(), json!(outcome.reason));
        fields.insert(
            "permit".to_string(),
            outcome
                .permit
                .as_ref()
                .map(hashing::to_canonical_value)
                .unwrap_or(Value::Null),
        );
        fields.insert("notarization".to_string(), notarization);
        fields.insert(
            "notify_status".to_string(),
            json!(if notify_error.is_none() { "sent" } else { "failed" }),
        );
        fields.insert("notify_error".to_string(), json!(notify_error));

        self.ledger.append(fields)?;
        info!(
            request_id = %outcome.request_id,
            status = %outcome.status,
            "Submit recorded"
        );
        Ok(outcome)
    }

    // ========================================================================
    // Execute path
    // ========================================================================

    /// Verifies a permit and dispatches the requested tool.
    ///
    /// Implements: REQ-ORCH-001/F-004..F-006
    ///
    /// Terminal states: EXECUTED, REJECTED, ERROR. REJECTED means no side
    /// effect was attempted; ERROR means the tool ran and failed. Exactly
    /// one audit entry is appended regardless of outcome.
    pub async fn execute(
        &self,
        permit_id: &str,
        tool: &str,
        payload: &Value,
    ) -> Result<ExecuteOutcome, GateError> {
        let (status, reason, tool_result) = self.run_execute(permit_id, tool, payload).await?;

        let mut fields = Map::new();
        fields.insert("action".to_string(), json!("execute"));
        fields.insert("permit_id".to_string(), json!(permit_id));
        fields.insert("status".to_string(), json!(status));
        fields.insert("final_status".to_string(), json!(status));
        fields.insert("reason".to_string(), json!(reason));
        fields.insert("tool".to_string(), json!(tool));
        fields.insert("tool_result".to_string(), tool_result.clone().unwrap_or(Value::Null));
        self.ledger.append(fields)?;

        info!(permit_id = %permit_id, status = %status, tool = %tool, "Execute recorded");
        Ok(ExecuteOutcome {
            permit_id: permit_id.to_string(),
            tool: tool.to_string(),
            status,
            reason,
            tool_result,
        })
    }

    async fn run_execute(
        &self,
        permit_id: &str,
        tool: &str,
        payload: &Value,
    ) -> Result<(Status, Option<String>, Option<Value>), GateError> {
        let rejected = |reason: &str| (Status::Rejected, Some(reason.to_string()), None);

        let Some(entry) = self.ledger.find_latest_by_permit_id(permit_id)? else {
            return Ok(rejected("permit not found"));
        };
        let Some(permit) = self.permits.get(permit_id) else {
            return Ok(rejected("permit not loaded"));
        };

        // The explanation on record must still hash to what was permitted.
        let stored = entry.fields.get("explain").cloned().unwrap_or(Value::Null);
        let digest = hashing::digest_hex(&stored);
        if let Err(rejection) = ExecutionGuard::verify(&permit, &digest) {
            return Ok(rejected(&rejection.to_string()));
        }

        let Ok(kind) = ToolKind::from_str(tool) else {
            return Ok(rejected("unknown tool"));
        };

        let result = match kind {
            ToolKind::NotarizeWrite => self
                .notary
                .write(&PermitRegistration::from_permit(&permit))
                .await
                .map(|receipt| json!({"tx_id": receipt.tx_id, "mode": receipt.mode}))
                .map_err(|err| err.to_string()),
            ToolKind::Notify => self
                .sink
                .send("audit", payload)
                .await
                .map(|()| json!({"delivered": true}))
                .map_err(|err| err.to_string()),
            ToolKind::StorageAppend => self
                .store
                .append_line(TOOL_OUTPUT_FILE, payload)
                .map(|()| json!({"appended": true}))
                .map_err(|err| err.to_string()),
        };

        match result {
            Ok(value) => Ok((Status::Executed, None, Some(value))),
            Err(reason) => {
                error!(tool = %tool, reason = %reason, "Tool execution failed");
                Ok((Status::Error, Some(format!("tool failed: {reason}")), None))
            }
        }
    }
}
