//! Request context supplied alongside a submitted request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied context for a gate request.
///
/// The `tools` list names the tool identifiers the caller intends to use;
/// the policy engine checks them against the policy's registered set. All
/// other keys ride along untyped and end up in the audit entry verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Tool identifiers the request intends to exercise.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Any additional context fields, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestContext {
    /// Context with the given tool identifiers and nothing else.
    #[must_use]
    pub fn with_tools<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
            extra: Map::new(),
        }
    }
}
