//! Explanation-producing agents.
//!
//! Implements: REQ-AGT-001
//!
//! The orchestrator never talks to a model directly. It talks to a
//! [`ReasoningAgent`], which turns a user request into a decision sentence
//! and then into a raw JSON explanation payload; the payload is validated
//! separately by the explain module. The production agent wraps any
//! [`TextGenerator`], a single blocking capability over a text model, so
//! provider concurrency stays an implementation detail of the generator.
//! [`ScriptedAgent`] is the deterministic offline default.

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::context::RequestContext;

/// Errors from decision or explanation generation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The generator backend could not be reached or failed mid-call.
    #[error("text generation failed: {reason}")]
    Transport {
        /// The underlying failure.
        reason: String,
    },

    /// The generator answered, but not with parseable JSON.
    #[error("generator output is not valid JSON: {reason}")]
    Malformed {
        /// The parse failure.
        reason: String,
    },
}

/// Minimal capability over a text model.
///
/// Implements: REQ-AGT-001/§5.1
///
/// Effectively synchronous from the caller's point of view; any pooling or
/// event-loop bridging a provider needs lives behind this method.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for the system and user prompts.
    async fn generate(&self, system: &str, user: &str) -> Result<String, AgentError>;
}

/// Turns user requests into decisions and explanations.
///
/// Explanation payloads are untrusted: the caller must validate them
/// before acting on them.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Produces the decision sentence for a user request.
    async fn generate_decision(
        &self,
        request: &str,
        context: &RequestContext,
    ) -> Result<String, AgentError>;

    /// Produces a raw explanation payload for the decision.
    async fn generate_explanation(
        &self,
        request: &str,
        decision: &str,
        context: &RequestContext,
    ) -> Result<Value, AgentError>;
}

const DECISION_SYSTEM_PROMPT: &str =
    "You are an authorization analyst. Given a user request, state the \
     concrete action to take as a single plain sentence. Respond with the \
     sentence only, no prose around it.";

const EXPLAIN_SYSTEM_PROMPT: &str =
    "You are an authorization analyst. Produce a JSON object justifying a \
     decision, with exactly these keys:\n\
     - \"decision\": the decision restated as one sentence\n\
     - \"rationale\": list of strings, why the decision is justified\n\
     - \"assumptions\": list of strings, what must hold for it to be safe\n\
     - \"risks\": list of objects with \"risk\", \"severity\" (LOW, MEDIUM, \
     or HIGH), and \"mitigation\"\n\
     - \"alternatives\": list of objects with \"option\" and \"why_not\"\n\
     Respond with the JSON object only.";

/// Production agent: prompts a [`TextGenerator`] and parses its replies.
///
/// Implements: REQ-AGT-001/F-001
#[derive(Debug)]
pub struct GeneratorAgent<G> {
    generator: G,
}

impl<G: TextGenerator> GeneratorAgent<G> {
    /// Agent over the given generator.
    #[must_use]
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    fn describe_tools(context: &RequestContext) -> String {
        if context.tools.is_empty() {
            "none".to_string()
        } else {
            context.tools.join(", ")
        }
    }
}

#[async_trait]
impl<G: TextGenerator> ReasoningAgent for GeneratorAgent<G> {
    async fn generate_decision(
        &self,
        request: &str,
        context: &RequestContext,
    ) -> Result<String, AgentError> {
        let user = format!(
            "Request: {request}\nRequested tools: {}",
            Self::describe_tools(context)
        );
        let reply = self.generator.generate(DECISION_SYSTEM_PROMPT, &user).await?;
        Ok(reply.trim().to_string())
    }

    async fn generate_explanation(
        &self,
        request: &str,
        decision: &str,
        context: &RequestContext,
    ) -> Result<Value, AgentError> {
        let user = format!(
            "Request: {request}\nDecision: {decision}\nRequested tools: {}",
            Self::describe_tools(context)
        );
        let reply = self.generator.generate(EXPLAIN_SYSTEM_PROMPT, &user).await?;
        debug!(bytes = reply.len(), "Generator replied");
        parse_json_reply(&reply)
    }
}

/// Extracts the JSON object from a generator reply, tolerating markdown
/// code fences around it.
fn parse_json_reply(reply: &str) -> Result<Value, AgentError> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(|err| AgentError::Malformed {
        reason: err.to_string(),
    })
}

/// Deterministic agent needing no backend.
///
/// The development and CLI default: the decision echoes the request and
/// the explanation is a fixed valid shape derived from it, so the full
/// pipeline runs offline with reproducible hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedAgent;

#[async_trait]
impl ReasoningAgent for ScriptedAgent {
    async fn generate_decision(
        &self,
        request: &str,
        _context: &RequestContext,
    ) -> Result<String, AgentError> {
        Ok(format!("Proceed with: {request}"))
    }

    async fn generate_explanation(
        &self,
        request: &str,
        decision: &str,
        _context: &RequestContext,
    ) -> Result<Value, AgentError> {
        Ok(json!({
            "decision": decision,
            "rationale": [format!("requested action: {request}")],
            "assumptions": ["request text reflects caller intent"],
            "risks": [{
                "risk": "request may have unintended side effects",
                "severity": "LOW",
                "mitigation": "action is reversible and audited"
            }],
            "alternatives": [{
                "option": "do nothing",
                "why_not": "request would remain unserved"
            }]
        }))
    }
}
