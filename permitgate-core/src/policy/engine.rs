//! Policy evaluation engine.
//!
//! Implements: REQ-POL-001/F-001 (Evaluation), F-002 (Hot Reload),
//! F-003 (Fail-Closed Loading)

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::{PolicyDocument, PolicyError, PolicyResult, RuleKind};
use crate::config::GateConfig;
use crate::context::RequestContext;
use crate::risk::RiskLevel;

/// Evaluates decision text against the current policy document.
///
/// Implements: REQ-POL-001/F-001
///
/// The document is re-read on every evaluation, so policy edits take effect
/// without a restart. A configured path that exists but cannot be read or
/// parsed is a hard error; only the absence of any configured path selects
/// the embedded development document.
#[derive(Debug)]
pub struct PolicyEngine {
    path: Option<PathBuf>,
}

impl PolicyEngine {
    /// Creates an engine reading from the given document path, or the
    /// embedded default document when `None`.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Creates an engine from gate configuration.
    #[must_use]
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.policy_path.clone())
    }

    /// Loads the current policy document.
    ///
    /// Implements: REQ-POL-001/F-002, F-003
    pub fn load(&self) -> Result<PolicyDocument, PolicyError> {
        match &self.path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|err| PolicyError::Load {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                })?;
                serde_json::from_str(&text).map_err(|err| PolicyError::Parse {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                })
            }
            None => {
                warn!("Using embedded default policy document - NOT FOR PRODUCTION");
                serde_json::from_str(embedded_default_document()).map_err(|err| {
                    PolicyError::Parse {
                        path: "embedded".to_string(),
                        reason: err.to_string(),
                    }
                })
            }
        }
    }

    /// Returns the current policy version string.
    pub fn version(&self) -> Result<String, PolicyError> {
        Ok(self.load()?.version)
    }

    /// Evaluates decision text and context against the current document.
    ///
    /// Implements: REQ-POL-001/F-001
    ///
    /// Rules run in declaration order. Risk is monotonically non-decreasing:
    /// a blocklist match pins HIGH, a require-approval match raises to at
    /// least MEDIUM but never lowers an earlier HIGH. Tools requested in the
    /// context but absent from the registered set are a HIGH violation.
    pub fn evaluate(
        &self,
        decision_text: &str,
        context: &RequestContext,
    ) -> Result<PolicyResult, PolicyError> {
        let document = self.load()?;
        Ok(Self::evaluate_document(&document, decision_text, context))
    }

    /// Evaluates against an already loaded document.
    ///
    /// Callers that also need the document's `version` load once and use
    /// this, so the version they record is the one actually evaluated.
    #[must_use]
    pub fn evaluate_document(
        document: &PolicyDocument,
        decision_text: &str,
        context: &RequestContext,
    ) -> PolicyResult {
        let lowered = decision_text.to_lowercase();

        let mut violations = Vec::new();
        let mut required_human_approval = false;
        let mut risk_level = RiskLevel::Low;

        for rule in &document.rules {
            let matched = rule
                .patterns
                .iter()
                .any(|pattern| lowered.contains(&pattern.to_lowercase()));
            if !matched {
                continue;
            }
            match rule.kind {
                RuleKind::Blocklist => {
                    let message = if rule.message.is_empty() {
                        rule.id.clone()
                    } else {
                        rule.message.clone()
                    };
                    debug!(rule = %rule.id, "Blocklist rule matched");
                    violations.push(message);
                    risk_level = risk_level.escalate(RiskLevel::High);
                }
                RuleKind::RequireApproval => {
                    debug!(rule = %rule.id, "Require-approval rule matched");
                    required_human_approval = true;
                    risk_level = risk_level.escalate(RiskLevel::Medium);
                }
            }
        }

        let unknown_tools: BTreeSet<&str> = context
            .tools
            .iter()
            .map(String::as_str)
            .filter(|tool| !document.registered_tools.contains(*tool))
            .collect();
        if !unknown_tools.is_empty() {
            let listed = unknown_tools.into_iter().collect::<Vec<_>>().join(", ");
            violations.push(format!("unregistered tools: {listed}"));
            risk_level = risk_level.escalate(RiskLevel::High);
        }

        PolicyResult {
            ok: violations.is_empty() && !required_human_approval,
            violations,
            risk_level,
            required_human_approval,
            engine_error: false,
        }
    }
}

/// Embedded default policy document for development.
///
/// Implements: REQ-POL-001/F-004
fn embedded_default_document() -> &'static str {
    include_str!("defaults.json")
}
