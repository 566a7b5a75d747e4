use serde::{Deserialize, Serialize};

/// Events emitted during a streaming run.
///
/// These are the streaming counterpart of a buffered run result: consumers
/// (e.g. an SSE handler in the API layer) receive partial results as they
/// arrive, enabling real-time display of multi-agent progress.
///
/// Every streamed run emits exactly one terminal [`Complete`](Self::Complete)
/// event on the success path, after zero or more intermediate events. Chunk
/// events for a given unit are strictly ordered and immediately followed by
/// that unit's `AgentDone` or `AgentError` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A team run has started.
    TeamStart {
        /// Id of the team definition.
        team_id: String,
        /// The composition strategy in effect.
        strategy: String,
        /// Number of agents in the roster.
        agent_count: usize,
    },

    /// A swarm run has started.
    SwarmStart {
        /// Id of the swarm definition.
        swarm_id: String,
        /// Number of agents dispatched concurrently.
        agent_count: usize,
    },

    /// A unit invocation has started.
    AgentStart {
        /// Id of the invoked agent.
        agent_id: String,
        /// Display name of the invoked agent.
        agent_name: String,
    },

    /// A fragment of streamed text from a unit, in arrival order.
    AgentChunk {
        /// Id of the producing agent.
        agent_id: String,
        /// The text fragment.
        chunk: String,
    },

    /// A unit invocation finished successfully.
    AgentDone {
        /// Id of the finished agent.
        agent_id: String,
        /// The full output; equals the in-order concatenation of this
        /// unit's chunks.
        output: String,
        /// Wall-clock duration of the invocation in milliseconds.
        duration_ms: u64,
    },

    /// A unit invocation failed or timed out.
    AgentError {
        /// Id of the failing agent.
        agent_id: String,
        /// Failure description.
        error: String,
    },

    /// Control was delegated from one participant to another.
    Handoff {
        /// Delegating participant (e.g. `"router"`).
        from: String,
        /// Id of the receiving agent.
        to: String,
        /// Why this agent was chosen.
        reason: String,
    },

    /// A new round of a multi-round strategy has started.
    RoundStart {
        /// 1-based round number.
        round: u32,
        /// Total number of rounds.
        max_rounds: u32,
    },

    /// The final synthesis step is about to run.
    SynthesisStart {
        /// Id of the synthesizing agent, or `"system"` for a direct
        /// completion.
        synthesizer_id: String,
    },

    /// Terminal event: the run finished and produced a final output.
    Complete {
        /// The final answer of the run.
        final_output: String,
        /// Total wall-clock duration in milliseconds.
        duration_ms: u64,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = ProgressEvent::AgentChunk {
            agent_id: "a1".to_string(),
            chunk: "hel".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"agent_chunk\""));
        assert!(json.contains("\"chunk\":\"hel\""));
    }

    #[test]
    fn test_terminal_event_round_trip() {
        let event = ProgressEvent::Complete {
            final_output: "answer".to_string(),
            duration_ms: 42,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            ProgressEvent::Complete { final_output, duration_ms: 42 } if final_output == "answer"
        ));
    }

    #[test]
    fn test_snake_case_variants() {
        let event = ProgressEvent::SynthesisStart {
            synthesizer_id: "system".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"synthesis_start\""));

        let event = ProgressEvent::RoundStart {
            round: 2,
            max_rounds: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"round_start\""));
    }
}
