//! Versioned rule documents and policy evaluation results.
//!
//! Implements: REQ-POL-001
//!
//! A policy document is a flat ordered rule list plus a registered-tool set.
//! Evaluation is substring matching over the lower-cased decision text; the
//! engine re-reads the document on every call so edits take effect without a
//! restart, and every permit records the `version` string it was approved
//! under.

mod engine;

pub use engine::PolicyEngine;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::risk::RiskLevel;

/// A versioned policy document.
///
/// Implements: REQ-POL-001/§5.2
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Policy generation identifier; flows into every permit.
    pub version: String,
    /// Rules, evaluated in declaration order.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Tool identifiers the policy recognizes.
    #[serde(default)]
    pub registered_tools: BTreeSet<String>,
}

/// One policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Stable rule identifier.
    pub id: String,
    /// What a pattern match means.
    #[serde(rename = "type")]
    pub kind: RuleKind,
    /// Substrings matched against the lower-cased decision text.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Violation message; falls back to the rule id when empty.
    #[serde(default)]
    pub message: String,
}

/// Rule classification.
///
/// Implements: REQ-POL-001/§5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// A match is a violation and raises risk to HIGH.
    Blocklist,
    /// A match demands human approval and raises risk to at least MEDIUM.
    RequireApproval,
}

/// Outcome of one policy evaluation.
///
/// Never persisted standalone; embedded in audit entries and responses.
///
/// Implements: REQ-POL-001/§5.3
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResult {
    /// True iff no violations and no approval requirement.
    pub ok: bool,
    /// Violation messages, in rule order.
    pub violations: Vec<String>,
    /// Highest risk reached during evaluation.
    pub risk_level: RiskLevel,
    /// A require-approval rule matched.
    pub required_human_approval: bool,
    /// True when this result was synthesized because the policy engine
    /// itself failed, so audit readers can tell "policy says no" from
    /// "policy engine crashed". Externally observed status is identical.
    #[serde(default)]
    pub engine_error: bool,
}

impl PolicyResult {
    /// Synthesizes the fail-closed result for a policy engine failure.
    ///
    /// Implements: REQ-ORCH-001/F-003.2
    #[must_use]
    pub fn fail_closed(reason: String) -> Self {
        Self {
            ok: false,
            violations: vec![reason],
            risk_level: RiskLevel::High,
            required_human_approval: false,
            engine_error: true,
        }
    }
}

/// Errors loading or parsing a policy document.
///
/// The orchestrator converts any of these into a fail-closed HIGH-risk
/// violation; they are never allowed to fail open.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A configured document exists but cannot be read.
    #[error("policy document unreadable at '{path}': {reason}")]
    Load {
        /// The configured path.
        path: String,
        /// The underlying failure.
        reason: String,
    },

    /// The document is not valid policy JSON.
    #[error("policy document invalid at '{path}': {reason}")]
    Parse {
        /// The configured path (or "embedded").
        path: String,
        /// The underlying failure.
        reason: String,
    },
}
