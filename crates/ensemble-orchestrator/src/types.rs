use ensemble_core::{AgentPersona, AgentResult, TranscriptEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Composition strategy of a team run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStrategy {
    /// Run units in roster order, each seeing its predecessors' outputs.
    /// Unrecognized strategy strings deserialize to this variant.
    Sequential,
    /// Every unit speaks once per round, for a fixed number of rounds.
    RoundRobin,
    /// Positions in round one, rebuttals in later rounds.
    Debate,
    /// Strict pipeline: each unit's raw output is the next unit's task.
    Chain,
    /// A supervisor decomposes the task, workers run concurrently, the
    /// supervisor synthesizes.
    Supervisor,
}

impl Default for TeamStrategy {
    fn default() -> Self {
        Self::Sequential
    }
}

impl<'de> Deserialize<'de> for TeamStrategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "round_robin" => Self::RoundRobin,
            "debate" => Self::Debate,
            "chain" => Self::Chain,
            "supervisor" => Self::Supervisor,
            // "sequential", and the fallback for unrecognized strategies
            _ => Self::Sequential,
        })
    }
}

impl std::fmt::Display for TeamStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::RoundRobin => write!(f, "round_robin"),
            Self::Debate => write!(f, "debate"),
            Self::Chain => write!(f, "chain"),
            Self::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// How a swarm combines its units' successful outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Markdown sections per agent, separated by horizontal rules.
    Concatenate,
    /// Majority vote over normalized outputs.
    Vote,
    /// One final answer synthesized by an agent or a direct completion.
    Synthesize,
    /// One completion picks the single best candidate verbatim.
    Best,
    /// Shallow JSON merge; non-JSON outputs keyed by agent name.
    Merge,
    /// Plain newline join. Unrecognized aggregation strings deserialize to
    /// this variant.
    Join,
}

impl<'de> Deserialize<'de> for Aggregation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "concatenate" => Self::Concatenate,
            "vote" => Self::Vote,
            "synthesize" => Self::Synthesize,
            "best" => Self::Best,
            "merge" => Self::Merge,
            // "join", and the fallback for unrecognized modes
            _ => Self::Join,
        })
    }
}

/// A team roster: agents plus strategy-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDefinition {
    /// Stable identifier of this team.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What this team is for.
    #[serde(default)]
    pub description: String,
    /// Ordered roster of personas.
    pub agents: Vec<AgentPersona>,
    /// Composition strategy.
    #[serde(default)]
    pub strategy: TeamStrategy,
    /// Supervisor for the supervisor strategy; defaults to the first
    /// roster member.
    #[serde(default)]
    pub supervisor_id: Option<String>,
    /// Roster member that synthesizes the final answer, when set.
    #[serde(default)]
    pub synthesizer_id: Option<String>,
    /// Rounds for round-robin (default 3) and debate (default 2).
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

fn default_agent_timeout_ms() -> u64 {
    60_000
}

fn default_min_completions() -> usize {
    1
}

/// A swarm roster: agents plus aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmDefinition {
    /// Stable identifier of this swarm.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What this swarm is for.
    #[serde(default)]
    pub description: String,
    /// Roster of personas, all dispatched concurrently.
    pub agents: Vec<AgentPersona>,
    /// How successful outputs are combined.
    pub aggregation: Aggregation,
    /// Roster member used by the `synthesize` aggregation, when set.
    #[serde(default)]
    pub synthesizer_id: Option<String>,
    /// Per-unit timeout in milliseconds.
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    /// Minimum number of successful completions for the run to count as
    /// successful.
    #[serde(default = "default_min_completions")]
    pub min_completions: usize,
}

/// A router roster: agents plus classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterDefinition {
    /// Stable identifier of this router.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What this router is for.
    #[serde(default)]
    pub description: String,
    /// Ordered roster of personas; order breaks keyword-score ties.
    pub agents: Vec<AgentPersona>,
    /// Fallback agent when classification finds no match.
    pub default_agent_id: String,
    /// Classify with a model call instead of keyword scoring.
    #[serde(default)]
    pub use_ai_routing: bool,
}

/// Input of one team run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRunConfig {
    /// The task given to the team.
    pub task: String,
    /// The user on whose behalf the team runs.
    pub user_id: String,
    /// The conversation the run belongs to.
    pub conversation_id: String,
    /// Caller-supplied context for the first unit(s).
    #[serde(default)]
    pub context: Option<String>,
}

/// Output of one team run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRunResult {
    /// The team's final answer.
    pub final_output: String,
    /// The strategy that produced it.
    pub strategy: TeamStrategy,
    /// Everything each unit said, in invocation order.
    pub transcript: Vec<TranscriptEntry>,
    /// One result per unit invocation, in invocation order.
    pub agent_results: Vec<AgentResult>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Input of one swarm run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmRunConfig {
    /// The shared task, unless overridden per agent.
    pub task: String,
    /// Per-agent task overrides, keyed by agent id.
    #[serde(default)]
    pub agent_tasks: HashMap<String, String>,
    /// The user on whose behalf the swarm runs.
    pub user_id: String,
    /// The conversation the run belongs to.
    pub conversation_id: String,
}

/// Output of one swarm run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmRunResult {
    /// Id of the swarm definition that ran.
    pub swarm_id: String,
    /// The shared task text.
    pub task: String,
    /// The aggregated final output, or the swarm failure message.
    pub final_output: String,
    /// One result per unit, in settlement order.
    pub agent_results: Vec<AgentResult>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Output of one routed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResult {
    /// Id of the chosen agent.
    pub agent_id: String,
    /// Display name of the chosen agent.
    pub agent_name: String,
    /// The chosen agent's answer.
    pub output: String,
    /// Wall-clock duration of the agent invocation in milliseconds.
    pub duration_ms: u64,
    /// Why this agent was chosen.
    pub routing_reason: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_strategy_falls_back_to_sequential() {
        let strategy: TeamStrategy = serde_json::from_str("\"consensus\"").unwrap();
        assert_eq!(strategy, TeamStrategy::Sequential);

        let strategy: TeamStrategy = serde_json::from_str("\"round_robin\"").unwrap();
        assert_eq!(strategy, TeamStrategy::RoundRobin);
    }

    #[test]
    fn test_unknown_aggregation_falls_back_to_join() {
        let aggregation: Aggregation = serde_json::from_str("\"blend\"").unwrap();
        assert_eq!(aggregation, Aggregation::Join);

        let aggregation: Aggregation = serde_json::from_str("\"vote\"").unwrap();
        assert_eq!(aggregation, Aggregation::Vote);
    }

    #[test]
    fn test_swarm_definition_defaults() {
        let definition: SwarmDefinition = serde_json::from_str(
            r#"{
                "id": "s1",
                "name": "Scouts",
                "agents": [],
                "aggregation": "concatenate"
            }"#,
        )
        .unwrap();
        assert_eq!(definition.agent_timeout_ms, 60_000);
        assert_eq!(definition.min_completions, 1);
        assert!(definition.synthesizer_id.is_none());
    }

    #[test]
    fn test_team_definition_defaults_to_sequential() {
        let definition: TeamDefinition = serde_json::from_str(
            r#"{"id": "t1", "name": "Team", "agents": []}"#,
        )
        .unwrap();
        assert_eq!(definition.strategy, TeamStrategy::Sequential);
        assert!(definition.max_rounds.is_none());
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(TeamStrategy::RoundRobin.to_string(), "round_robin");
        assert_eq!(TeamStrategy::Supervisor.to_string(), "supervisor");
    }
}
