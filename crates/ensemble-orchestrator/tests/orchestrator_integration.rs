#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use ensemble_agent::{CallOptions, Completion, LlmBackend, LlmClient, StreamEvent};
use ensemble_core::{AgentPersona, ChatMessage, EnsembleError, EnsembleResult, ProgressEvent};
use ensemble_orchestrator::{
    Aggregation, AgentRouter, RouterDefinition, SwarmDefinition, SwarmOrchestrator,
    SwarmRunConfig, TeamDefinition, TeamOrchestrator, TeamRunConfig, TeamStrategy,
};
use ensemble_skills::{IntegrationRegistry, SkillRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Scripted backends
// ---------------------------------------------------------------------------

/// Picks a response by substring match over the full message list, so
/// concurrent calls stay deterministic. Streams split responses into two
/// chunks.
struct RuleBackend {
    /// (needle, response); first match wins.
    rules: Vec<(String, String)>,
    /// Any match makes the call fail.
    fail_needles: Vec<String>,
    default: String,
    delay: Option<Duration>,
}

impl RuleBackend {
    fn new(default: &str) -> Self {
        Self {
            rules: Vec::new(),
            fail_needles: Vec::new(),
            default: default.to_string(),
            delay: None,
        }
    }

    fn rule(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), response.to_string()));
        self
    }

    fn fail_on(mut self, needle: &str) -> Self {
        self.fail_needles.push(needle.to_string());
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn respond(&self, messages: &[ChatMessage]) -> EnsembleResult<String> {
        let haystack: String = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        for needle in &self.fail_needles {
            if haystack.contains(needle) {
                return Err(EnsembleError::Http("backend unavailable".to_string()));
            }
        }
        for (needle, response) in &self.rules {
            if haystack.contains(needle) {
                return Ok(response.clone());
            }
        }
        Ok(self.default.clone())
    }
}

#[async_trait]
impl LlmBackend for RuleBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ensemble_skills::SkillDescriptor],
        _opts: &CallOptions,
    ) -> EnsembleResult<Completion> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Completion::text_only(self.respond(messages)?))
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        _tools: &[ensemble_skills::SkillDescriptor],
        _opts: &CallOptions,
    ) -> EnsembleResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<EnsembleResult<Completion>>,
    )> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.respond(messages)?;
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move {
            let split = response.len() / 2;
            let (head, tail) = response.split_at(split);
            for fragment in [head, tail] {
                if !fragment.is_empty() {
                    let _ = tx
                        .send(StreamEvent::TextDelta {
                            text: fragment.to_string(),
                        })
                        .await;
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
            Ok(Completion::text_only(response))
        });
        Ok((rx, handle))
    }
}

/// Echoes the last user message with a marker appended; used to observe
/// chain piping.
struct EchoBackend;

#[async_trait]
impl LlmBackend for EchoBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ensemble_skills::SkillDescriptor],
        _opts: &CallOptions,
    ) -> EnsembleResult<Completion> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ensemble_core::Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(Completion::text_only(format!("{last_user}+")))
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ensemble_skills::SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<EnsembleResult<Completion>>,
    )> {
        let completion = self.complete(messages, tools, opts).await?;
        let (tx, rx) = mpsc::channel(4);
        let text = completion.text.clone();
        let handle = tokio::spawn(async move {
            let _ = tx.send(StreamEvent::TextDelta { text: text.clone() }).await;
            let _ = tx.send(StreamEvent::Done).await;
            Ok(Completion::text_only(text))
        });
        Ok((rx, handle))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn llm(backend: impl LlmBackend + 'static) -> Arc<LlmClient> {
    Arc::new(LlmClient::from_backend(Box::new(backend)))
}

fn registries() -> (Arc<SkillRegistry>, Arc<IntegrationRegistry>) {
    (
        Arc::new(SkillRegistry::new()),
        Arc::new(IntegrationRegistry::new()),
    )
}

fn persona(id: &str, name: &str, role: &str) -> AgentPersona {
    AgentPersona::new(id, name, role, format!("You are {name}."))
}

fn team_definition(agents: Vec<AgentPersona>, strategy: TeamStrategy) -> TeamDefinition {
    TeamDefinition {
        id: "team-1".to_string(),
        name: "Test Team".to_string(),
        description: String::new(),
        agents,
        strategy,
        supervisor_id: None,
        synthesizer_id: None,
        max_rounds: None,
    }
}

fn team(definition: TeamDefinition, backend: impl LlmBackend + 'static) -> TeamOrchestrator {
    let (skills, integrations) = registries();
    TeamOrchestrator::new(definition, llm(backend), skills, integrations)
}

fn swarm_definition(agents: Vec<AgentPersona>, aggregation: Aggregation) -> SwarmDefinition {
    SwarmDefinition {
        id: "swarm-1".to_string(),
        name: "Test Swarm".to_string(),
        description: String::new(),
        agents,
        aggregation,
        synthesizer_id: None,
        agent_timeout_ms: 60_000,
        min_completions: 1,
    }
}

fn swarm(definition: SwarmDefinition, backend: impl LlmBackend + 'static) -> SwarmOrchestrator {
    let (skills, integrations) = registries();
    SwarmOrchestrator::new(definition, llm(backend), skills, integrations)
}

fn team_config(task: &str) -> TeamRunConfig {
    TeamRunConfig {
        task: task.to_string(),
        user_id: "u1".to_string(),
        conversation_id: "c1".to_string(),
        context: None,
    }
}

fn swarm_config(task: &str) -> SwarmRunConfig {
    SwarmRunConfig {
        task: task.to_string(),
        agent_tasks: HashMap::new(),
        user_id: "u1".to_string(),
        conversation_id: "c1".to_string(),
    }
}

async fn collect(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Team strategies — buffered
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequential_produces_one_result_per_agent() {
    let agents = vec![
        persona("a", "Alpha", "researcher"),
        persona("b", "Beta", "analyst"),
        persona("c", "Gamma", "writer"),
    ];
    let orchestrator = team(
        team_definition(agents, TeamStrategy::Sequential),
        RuleBackend::new("contribution").rule("synthesis agent", "synthesized!"),
    );

    let result = orchestrator.run(team_config("write a report")).await.unwrap();

    assert_eq!(result.agent_results.len(), 3);
    assert_eq!(result.transcript.len(), 3);
    assert_eq!(result.final_output, "synthesized!");
    assert_eq!(result.strategy, TeamStrategy::Sequential);
    // Invocation order is preserved.
    let ids: Vec<&str> = result.agent_results.iter().map(|r| r.agent_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn single_agent_sequential_skips_synthesis() {
    let orchestrator = team(
        team_definition(vec![persona("solo", "Solo", "generalist")], TeamStrategy::Sequential),
        RuleBackend::new("the answer"),
    );

    let result = orchestrator.run(team_config("task")).await.unwrap();
    assert_eq!(result.agent_results.len(), 1);
    assert_eq!(result.final_output, "the answer");
}

#[tokio::test]
async fn round_robin_runs_every_agent_every_round() {
    let agents = vec![persona("a", "Alpha", "optimist"), persona("b", "Beta", "skeptic")];
    let orchestrator = team(
        team_definition(agents, TeamStrategy::RoundRobin),
        RuleBackend::new("point").rule("synthesis agent", "discussion summary"),
    );

    let result = orchestrator.run(team_config("discuss")).await.unwrap();

    // 2 agents x 3 default rounds.
    assert_eq!(result.agent_results.len(), 6);
    assert_eq!(result.final_output, "discussion summary");
}

#[tokio::test]
async fn debate_runs_two_default_rounds() {
    let agents = vec![
        persona("a", "Alpha", "advocate"),
        persona("b", "Beta", "critic"),
        persona("c", "Gamma", "judge"),
    ];
    let orchestrator = team(
        team_definition(agents, TeamStrategy::Debate),
        RuleBackend::new("argument")
            .rule("synthesis agent", "verdict")
            .rule("Take a clear position", "my position")
            .rule("rebuttal", "my rebuttal"),
    );

    let result = orchestrator.run(team_config("tabs or spaces?")).await.unwrap();

    // 3 agents x 2 default rounds.
    assert_eq!(result.agent_results.len(), 6);
    assert_eq!(result.agent_results[0].output, "my position");
    assert_eq!(result.agent_results[5].output, "my rebuttal");
    assert_eq!(result.final_output, "verdict");
}

#[tokio::test]
async fn chain_pipes_raw_output_between_agents() {
    let agents = vec![
        persona("a", "Alpha", "drafter"),
        persona("b", "Beta", "editor"),
        persona("c", "Gamma", "proofreader"),
    ];
    let orchestrator = team(team_definition(agents, TeamStrategy::Chain), EchoBackend);

    let result = orchestrator.run(team_config("seed")).await.unwrap();

    assert_eq!(result.agent_results.len(), 3);
    assert_eq!(result.agent_results[0].output, "seed+");
    assert_eq!(result.agent_results[1].output, "seed++");
    assert_eq!(result.final_output, "seed+++");
}

#[tokio::test]
async fn chain_with_zero_agents_returns_empty_output() {
    let orchestrator = team(
        team_definition(Vec::new(), TeamStrategy::Chain),
        RuleBackend::new("unused"),
    );

    let result = orchestrator.run(team_config("anything")).await.unwrap();
    assert_eq!(result.final_output, "");
    assert!(result.agent_results.is_empty());
}

#[tokio::test]
async fn team_propagates_unit_failure() {
    let agents = vec![persona("a", "Alpha", "worker"), persona("doomed", "Doomed", "worker")];
    let orchestrator = team(
        team_definition(agents, TeamStrategy::Sequential),
        RuleBackend::new("fine").fail_on("Doomed"),
    );

    assert!(orchestrator.run(team_config("task")).await.is_err());
}

// ---------------------------------------------------------------------------
// Supervisor strategy
// ---------------------------------------------------------------------------

fn supervisor_definition() -> TeamDefinition {
    let mut definition = team_definition(
        vec![
            persona("lead", "Lead", "supervisor"),
            persona("w1", "Worker One", "coder"),
            persona("w2", "Worker Two", "tester"),
        ],
        TeamStrategy::Supervisor,
    );
    definition.supervisor_id = Some("lead".to_string());
    definition
}

#[tokio::test]
async fn supervisor_assigns_workers_and_synthesizes() {
    let plan = r#"[{"agent_id": "w1", "subtask": "implement it"},
                   {"agent_id": "w2", "subtask": "test it"}]"#;
    let orchestrator = team(
        supervisor_definition(),
        RuleBackend::new("worker output")
            .rule("Decompose the following task", plan)
            .rule("Synthesize a final answer", "shipped"),
    );

    let result = orchestrator.run(team_config("build the feature")).await.unwrap();

    // Supervisor plan + 2 workers.
    assert_eq!(result.agent_results.len(), 3);
    assert_eq!(result.agent_results[0].agent_id, "lead");
    assert_eq!(result.final_output, "shipped");
}

#[tokio::test]
async fn supervisor_skips_unknown_worker_ids() {
    let plan = r#"[{"agent_id": "w1", "subtask": "implement it"},
                   {"agent_id": "ghost", "subtask": "haunt it"}]"#;
    let orchestrator = team(
        supervisor_definition(),
        RuleBackend::new("worker output")
            .rule("Decompose the following task", plan)
            .rule("Synthesize a final answer", "done"),
    );

    let result = orchestrator.run(team_config("task")).await.unwrap();
    assert_eq!(result.agent_results.len(), 2);
}

#[tokio::test]
async fn supervisor_with_unparseable_plan_synthesizes_alone() {
    let orchestrator = team(
        supervisor_definition(),
        RuleBackend::new("worker output")
            .rule("Decompose the following task", "I cannot produce JSON today")
            .rule("Synthesize a final answer", "best effort"),
    );

    let result = orchestrator.run(team_config("task")).await.unwrap();

    // Only the supervisor's own invocation is recorded.
    assert_eq!(result.agent_results.len(), 1);
    assert_eq!(result.final_output, "best effort");
}

#[tokio::test]
async fn supervisor_not_found_is_fatal() {
    let mut definition = supervisor_definition();
    definition.supervisor_id = Some("missing".to_string());
    let orchestrator = team(definition, RuleBackend::new("unused"));

    let err = orchestrator.run(team_config("task")).await.unwrap_err();
    assert!(err.to_string().contains("Supervisor agent not found"));
}

// ---------------------------------------------------------------------------
// Swarm — aggregation and failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn swarm_vote_reports_majority() {
    let agents = vec![
        persona("v1", "Voter One", "judge"),
        persona("v2", "Voter Two", "judge"),
        persona("v3", "Voter Three", "judge"),
    ];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Vote),
        RuleBackend::new("No")
            .rule("Voter One", "Yes")
            .rule("Voter Two", "Yes"),
    );

    let result = orchestrator.run(swarm_config("approve?")).await.unwrap();

    assert!(result.final_output.contains("Yes"));
    assert!(result.final_output.contains("2/3"));
    assert_eq!(result.agent_results.len(), 3);
}

#[tokio::test]
async fn swarm_merge_combines_json_objects() {
    let agents = vec![persona("m1", "Merger One", "collector"), persona("m2", "Merger Two", "collector")];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Merge),
        RuleBackend::new("{}")
            .rule("Merger One", r#"{"a": 1}"#)
            .rule("Merger Two", r#"{"b": 2}"#),
    );

    let result = orchestrator.run(swarm_config("gather")).await.unwrap();
    let merged: serde_json::Value = serde_json::from_str(&result.final_output).unwrap();
    assert_eq!(merged, serde_json::json!({"a": 1, "b": 2}));
}

#[tokio::test]
async fn swarm_concatenate_renders_markdown_sections() {
    let agents = vec![persona("s1", "Scout", "scout"), persona("s2", "Ranger", "ranger")];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Concatenate),
        RuleBackend::new("report").rule("Scout", "north clear").rule("Ranger", "south blocked"),
    );

    let result = orchestrator.run(swarm_config("survey")).await.unwrap();
    assert!(result.final_output.contains("## Scout"));
    assert!(result.final_output.contains("## Ranger"));
    assert!(result.final_output.contains("---"));
}

#[tokio::test]
async fn swarm_best_picks_via_completion() {
    let agents = vec![persona("c1", "Cand One", "writer"), persona("c2", "Cand Two", "writer")];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Best),
        RuleBackend::new("draft")
            .rule("single best answer", "the winning draft"),
    );

    let result = orchestrator.run(swarm_config("draft it")).await.unwrap();
    assert_eq!(result.final_output, "the winning draft");
}

#[tokio::test]
async fn swarm_synthesize_emits_final_answer() {
    let agents = vec![persona("s1", "Synth One", "ideator"), persona("s2", "Synth Two", "ideator")];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Synthesize),
        RuleBackend::new("idea").rule("synthesis agent", "combined idea"),
    );

    let result = orchestrator.run(swarm_config("ideate")).await.unwrap();
    assert_eq!(result.final_output, "combined idea");
}

#[tokio::test]
async fn swarm_isolates_individual_failures() {
    let agents = vec![persona("ok", "Steady", "worker"), persona("doomed", "Doomed", "worker")];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Concatenate),
        RuleBackend::new("all good").fail_on("Doomed"),
    );

    let result = orchestrator.run(swarm_config("work")).await.unwrap();

    assert_eq!(result.agent_results.len(), 2);
    let failed = result.agent_results.iter().find(|r| !r.is_success()).unwrap();
    assert_eq!(failed.agent_id, "doomed");
    assert!(failed.error.as_deref().unwrap().contains("backend unavailable"));
    // The survivor still aggregates.
    assert!(result.final_output.contains("all good"));
}

#[tokio::test]
async fn swarm_with_min_completions_zero_never_fails() {
    let agents = vec![persona("a", "Alpha", "worker"), persona("b", "Beta", "worker")];
    let mut definition = swarm_definition(agents, Aggregation::Concatenate);
    definition.min_completions = 0;
    let orchestrator = swarm(definition, RuleBackend::new("unused").fail_on("You are"));

    let result = orchestrator.run(swarm_config("work")).await.unwrap();
    assert!(!result.final_output.contains("Swarm failed"));
    assert!(result.agent_results.iter().all(|r| !r.is_success()));
}

#[tokio::test]
async fn swarm_below_threshold_reports_failure_message() {
    let agents = vec![persona("a", "Alpha", "worker")];
    let mut definition = swarm_definition(agents, Aggregation::Concatenate);
    definition.min_completions = 2;
    let orchestrator = swarm(definition, RuleBackend::new("unused").fail_on("You are"));

    let result = orchestrator.run(swarm_config("work")).await.unwrap();
    assert_eq!(result.final_output, "Swarm failed: completed 0/2");
}

#[tokio::test]
async fn swarm_timeout_surfaces_as_agent_timeout() {
    let agents = vec![persona("slow", "Slowpoke", "worker")];
    let mut definition = swarm_definition(agents, Aggregation::Concatenate);
    definition.agent_timeout_ms = 50;
    definition.min_completions = 0;
    let orchestrator = swarm(
        definition,
        RuleBackend::new("too late").delayed(Duration::from_millis(500)),
    );

    let result = orchestrator.run(swarm_config("hurry")).await.unwrap();
    assert_eq!(result.agent_results.len(), 1);
    assert_eq!(result.agent_results[0].error.as_deref(), Some("Agent timeout"));
}

#[tokio::test]
async fn swarm_honors_per_agent_task_overrides() {
    let agents = vec![persona("a", "Alpha", "worker"), persona("b", "Beta", "worker")];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Join),
        RuleBackend::new("shared").rule("special assignment", "custom"),
    );

    let mut config = swarm_config("shared task");
    config
        .agent_tasks
        .insert("b".to_string(), "special assignment".to_string());
    let result = orchestrator.run(config).await.unwrap();

    let outputs: Vec<&str> = result.agent_results.iter().map(|r| r.output.as_str()).collect();
    assert!(outputs.contains(&"custom"));
    assert!(outputs.contains(&"shared"));
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn router_definition(use_ai_routing: bool) -> RouterDefinition {
    RouterDefinition {
        id: "router-1".to_string(),
        name: "Front Door".to_string(),
        description: String::new(),
        agents: vec![
            persona("generalist", "Generalist", "general assistant"),
            persona("chef", "Chef", "cooking recipe expert"),
            persona("quant", "Quant", "finance expert"),
        ],
        default_agent_id: "generalist".to_string(),
        use_ai_routing,
    }
}

fn router(definition: RouterDefinition, backend: impl LlmBackend + 'static) -> AgentRouter {
    let (skills, integrations) = registries();
    AgentRouter::new(definition, llm(backend), skills, integrations).unwrap()
}

#[tokio::test]
async fn router_keyword_classification_is_deterministic() {
    let router = router(router_definition(false), RuleBackend::new("answer"));

    for _ in 0..3 {
        let result = router.route("share a cooking recipe", "u1", "c1", None).await.unwrap();
        assert_eq!(result.agent_id, "chef");
        assert!(result.routing_reason.starts_with("Role keyword overlap"));
    }
}

#[tokio::test]
async fn router_falls_back_to_default_without_keyword_match() {
    let router = router(router_definition(false), RuleBackend::new("answer"));

    let result = router.route("xylophone maintenance", "u1", "c1", None).await.unwrap();
    assert_eq!(result.agent_id, "generalist");
    assert!(result.routing_reason.contains("no keyword match"));
}

#[tokio::test]
async fn router_rejects_unknown_default_agent() {
    let mut definition = router_definition(false);
    definition.default_agent_id = "nobody".to_string();
    let (skills, integrations) = registries();
    let err = AgentRouter::new(
        definition,
        llm(RuleBackend::new("unused")),
        skills,
        integrations,
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("Default agent not found"));
}

#[tokio::test]
async fn router_ai_classification_parses_model_choice() {
    let router = router(
        router_definition(true),
        RuleBackend::new("answer")
            .rule("Reply with JSON", r#"{"agent_id": "quant", "reason": "money question"}"#),
    );

    let result = router.route("what is compound interest?", "u1", "c1", None).await.unwrap();
    assert_eq!(result.agent_id, "quant");
    assert_eq!(result.routing_reason, "money question");
}

#[tokio::test]
async fn router_ai_classification_falls_back_on_garbage() {
    let router = router(
        router_definition(true),
        RuleBackend::new("answer").rule("Reply with JSON", "no json in sight"),
    );

    let result = router.route("hello", "u1", "c1", None).await.unwrap();
    assert_eq!(result.agent_id, "generalist");
    assert_eq!(result.routing_reason, "AI routing fallback to default agent");
}

#[tokio::test]
async fn router_ai_classification_rejects_unknown_agent_id() {
    let router = router(
        router_definition(true),
        RuleBackend::new("answer")
            .rule("Reply with JSON", r#"{"agent_id": "impostor", "reason": "trust me"}"#),
    );

    let result = router.route("hello", "u1", "c1", None).await.unwrap();
    assert_eq!(result.agent_id, "generalist");
    assert_eq!(result.routing_reason, "AI routing fallback to default agent");
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn team_stream_emits_lifecycle_and_complete() {
    let agents = vec![persona("a", "Alpha", "worker"), persona("b", "Beta", "worker")];
    let orchestrator = team(
        team_definition(agents, TeamStrategy::Sequential),
        RuleBackend::new("streamed output").rule("synthesis agent", "final"),
    );

    let events = collect(orchestrator.run_stream(team_config("task"))).await;

    assert!(matches!(events.first(), Some(ProgressEvent::TeamStart { agent_count: 2, .. })));
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::SynthesisStart { .. })));

    // Per-unit chunks concatenate to that unit's done output.
    let mut chunks: HashMap<String, String> = HashMap::new();
    let mut outputs: HashMap<String, String> = HashMap::new();
    for event in &events {
        match event {
            ProgressEvent::AgentChunk { agent_id, chunk } => {
                chunks.entry(agent_id.clone()).or_default().push_str(chunk);
            }
            ProgressEvent::AgentDone { agent_id, output, .. } => {
                outputs.insert(agent_id.clone(), output.clone());
            }
            _ => {}
        }
    }
    for (agent_id, output) in &outputs {
        assert_eq!(chunks.get(agent_id), Some(output), "chunks must equal output for {agent_id}");
    }
}

#[tokio::test]
async fn round_robin_stream_announces_rounds() {
    let agents = vec![persona("a", "Alpha", "worker")];
    let mut definition = team_definition(agents, TeamStrategy::RoundRobin);
    definition.max_rounds = Some(2);
    let orchestrator = team(definition, RuleBackend::new("talk"));

    let events = collect(orchestrator.run_stream(team_config("task"))).await;
    let rounds: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::RoundStart { round, max_rounds } => {
                assert_eq!(*max_rounds, 2);
                Some(*round)
            }
            _ => None,
        })
        .collect();
    assert_eq!(rounds, vec![1, 2]);
}

#[tokio::test]
async fn team_stream_ends_without_complete_on_failure() {
    let agents = vec![persona("doomed", "Doomed", "worker")];
    let orchestrator = team(
        team_definition(agents, TeamStrategy::Sequential),
        RuleBackend::new("unused").fail_on("Doomed"),
    );

    let events = collect(orchestrator.run_stream(team_config("task"))).await;

    assert!(events.iter().any(|e| matches!(e, ProgressEvent::AgentError { .. })));
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::Complete { .. })));
}

#[tokio::test]
async fn swarm_stream_forwards_units_and_completes() {
    let agents = vec![persona("s1", "One", "worker"), persona("s2", "Two", "worker")];
    let orchestrator = swarm(
        swarm_definition(agents, Aggregation::Join),
        RuleBackend::new("part"),
    );

    let events = collect(orchestrator.run_stream(swarm_config("task"))).await;

    assert!(matches!(events.first(), Some(ProgressEvent::SwarmStart { agent_count: 2, .. })));
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
    let done_count = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::AgentDone { .. }))
        .count();
    assert_eq!(done_count, 2);
}

#[tokio::test]
async fn router_stream_leads_with_handoff() {
    let router = router(router_definition(false), RuleBackend::new("bonjour"));

    let events = collect(
        router
            .route_stream("share a cooking recipe", "u1", "c1", None)
            .await
            .unwrap(),
    )
    .await;

    match events.first() {
        Some(ProgressEvent::Handoff { from, to, .. }) => {
            assert_eq!(from, "router");
            assert_eq!(to, "chef");
        }
        other => panic!("expected handoff first, got {other:?}"),
    }
    assert!(matches!(events.last(), Some(ProgressEvent::AgentDone { .. })));
}
