use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn agent_role() -> String {
    "agent".to_string()
}

/// One entry in the append-only, chronologically ordered log of what each
/// unit produced during a run.
///
/// The transcript is used as shared context for later units in a strategy
/// and returned to the caller alongside the final output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Id of the agent that produced this entry.
    pub agent_id: String,
    /// Display name of the agent.
    pub agent_name: String,
    /// Entry role; always `"agent"` for entries produced by this core.
    #[serde(default = "agent_role")]
    pub role: String,
    /// The text the agent produced.
    pub content: String,
    /// UTC timestamp of when the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    /// Creates an entry for the given agent, stamped with the current time.
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            role: agent_role(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The outcome of exactly one unit invocation.
///
/// Every unit invocation in a run produces exactly one result, even on
/// failure; when `error` is set the `output` must not be trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Id of the invoked agent.
    pub agent_id: String,
    /// Display name of the invoked agent.
    pub agent_name: String,
    /// The text the agent produced (empty when the invocation failed).
    pub output: String,
    /// Wall-clock duration of the invocation in milliseconds.
    pub duration_ms: u64,
    /// Failure description when the call errored or timed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    /// Creates a successful result.
    pub fn success(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        output: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            output: output.into(),
            duration_ms,
            error: None,
        }
    }

    /// Creates a failed result carrying the error description.
    pub fn failure(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            output: String::new(),
            duration_ms,
            error: Some(error.into()),
        }
    }

    /// Whether this invocation completed without an error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
