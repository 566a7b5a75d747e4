use crate::json::first_json_array;
use crate::roster::{invoke_unit, materialize_units, record_unit_output, render_transcript, EventSink};
use crate::synthesis::synthesize_results;
use crate::types::{TeamDefinition, TeamRunConfig, TeamRunResult, TeamStrategy};
use ensemble_agent::{AgentUnit, CallOptions, LlmClient};
use ensemble_core::{
    AgentResult, ChatMessage, EnsembleError, EnsembleResult, ProgressEvent, TranscriptEntry,
};
use ensemble_skills::{IntegrationRegistry, SkillRegistry};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const DEFAULT_DISCUSSION_ROUNDS: u32 = 3;
const DEFAULT_DEBATE_ROUNDS: u32 = 2;

type StrategyOutcome = (String, Vec<TranscriptEntry>, Vec<AgentResult>);

/// Executes a roster of agents under one of five composition strategies and
/// produces one final answer.
///
/// Unit failures propagate and abort the whole run; only the swarm
/// orchestrator isolates them.
#[derive(Clone)]
pub struct TeamOrchestrator {
    definition: Arc<TeamDefinition>,
    units: Arc<Vec<AgentUnit>>,
    by_id: Arc<HashMap<String, AgentUnit>>,
    llm: Arc<LlmClient>,
}

impl TeamOrchestrator {
    /// Materializes the roster into executable units.
    pub fn new(
        definition: TeamDefinition,
        llm: Arc<LlmClient>,
        skills: Arc<SkillRegistry>,
        integrations: Arc<IntegrationRegistry>,
    ) -> Self {
        let (units, by_id) =
            materialize_units(&definition.agents, &llm, &skills, &integrations);
        Self {
            definition: Arc::new(definition),
            units: Arc::new(units),
            by_id: Arc::new(by_id),
            llm,
        }
    }

    /// Runs the team to completion and returns the buffered result.
    pub async fn run(&self, config: TeamRunConfig) -> EnsembleResult<TeamRunResult> {
        let start = Instant::now();
        info!(
            team_id = %self.definition.id,
            strategy = %self.definition.strategy,
            "Team run started"
        );

        let (final_output, transcript, agent_results) = self.execute(&config, None).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(team_id = %self.definition.id, duration_ms, "Team run finished");

        Ok(TeamRunResult {
            final_output,
            strategy: self.definition.strategy,
            transcript,
            agent_results,
            duration_ms,
        })
    }

    /// Streaming variant of [`run`](Self::run): emits `team_start`,
    /// per-unit events, `round_start`/`synthesis_start` where applicable,
    /// and a terminal `complete`. On a unit failure the failing unit's
    /// `agent_error` is the last event; no `complete` follows.
    pub fn run_stream(&self, config: TeamRunConfig) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel::<ProgressEvent>(64);
        let this = self.clone();

        tokio::spawn(async move {
            let start = Instant::now();
            match this.execute(&config, Some(&tx)).await {
                Ok((final_output, _, _)) => {
                    let _ = tx
                        .send(ProgressEvent::Complete {
                            final_output,
                            duration_ms: start.elapsed().as_millis() as u64,
                        })
                        .await;
                }
                Err(e) => {
                    error!(team_id = %this.definition.id, error = %e, "Team stream aborted");
                }
            }
        });

        rx
    }

    async fn execute(
        &self,
        config: &TeamRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<StrategyOutcome> {
        if let Some(tx) = sink {
            let _ = tx
                .send(ProgressEvent::TeamStart {
                    team_id: self.definition.id.clone(),
                    strategy: self.definition.strategy.to_string(),
                    agent_count: self.units.len(),
                })
                .await;
        }

        match self.definition.strategy {
            TeamStrategy::Sequential => self.run_sequential(config, sink).await,
            TeamStrategy::RoundRobin => self.run_round_robin(config, sink).await,
            TeamStrategy::Debate => self.run_debate(config, sink).await,
            TeamStrategy::Chain => self.run_chain(config, sink).await,
            TeamStrategy::Supervisor => self.run_supervisor(config, sink).await,
        }
    }

    /// Roster order; every unit after the first sees all prior outputs as
    /// context.
    async fn run_sequential(
        &self,
        config: &TeamRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<StrategyOutcome> {
        let mut transcript = Vec::new();
        let mut results = Vec::new();
        let mut outputs: Vec<String> = Vec::new();

        for (i, unit) in self.units.iter().enumerate() {
            let accumulated = outputs.join("\n\n");
            let context = if i == 0 {
                config.context.as_deref()
            } else {
                Some(accumulated.as_str())
            };

            let output = invoke_unit(
                unit,
                &config.task,
                &config.user_id,
                &config.conversation_id,
                context,
                &[],
                sink,
            )
            .await?;

            record_unit_output(&mut transcript, &mut results, unit, &output);
            outputs.push(output.output);
        }

        let final_output = self.synthesize(&transcript, &results, config, sink).await?;
        Ok((final_output, transcript, results))
    }

    /// Fixed number of rounds; round one runs the original task, later
    /// rounds continue the discussion over the transcript so far.
    async fn run_round_robin(
        &self,
        config: &TeamRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<StrategyOutcome> {
        let max_rounds = self
            .definition
            .max_rounds
            .unwrap_or(DEFAULT_DISCUSSION_ROUNDS);
        let mut transcript = Vec::new();
        let mut results = Vec::new();

        for round in 1..=max_rounds {
            if let Some(tx) = sink {
                let _ = tx
                    .send(ProgressEvent::RoundStart { round, max_rounds })
                    .await;
            }

            for unit in self.units.iter() {
                let (task, context) = if round == 1 {
                    (config.task.clone(), config.context.clone())
                } else {
                    (
                        format!(
                            "Continue the discussion, building on what has been said \
                             so far. Round {round}/{max_rounds}"
                        ),
                        Some(render_transcript(&transcript)),
                    )
                };

                let output = invoke_unit(
                    unit,
                    &task,
                    &config.user_id,
                    &config.conversation_id,
                    context.as_deref(),
                    &[],
                    sink,
                )
                .await?;

                record_unit_output(&mut transcript, &mut results, unit, &output);
            }
        }

        let final_output = self.synthesize(&transcript, &results, config, sink).await?;
        Ok((final_output, transcript, results))
    }

    /// Round one asks every unit for a clear position; later rounds ask for
    /// rebuttals against the other units' latest statements.
    async fn run_debate(
        &self,
        config: &TeamRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<StrategyOutcome> {
        let max_rounds = self.definition.max_rounds.unwrap_or(DEFAULT_DEBATE_ROUNDS);
        let mut transcript = Vec::new();
        let mut results = Vec::new();
        let mut latest: HashMap<String, String> = HashMap::new();

        for round in 1..=max_rounds {
            if let Some(tx) = sink {
                let _ = tx
                    .send(ProgressEvent::RoundStart { round, max_rounds })
                    .await;
            }

            for unit in self.units.iter() {
                let (task, context) = if round == 1 {
                    (
                        format!(
                            "Take a clear position on the following task: {}",
                            config.task
                        ),
                        config.context.clone(),
                    )
                } else {
                    let statements: Vec<String> = self
                        .units
                        .iter()
                        .filter(|other| other.id() != unit.id())
                        .filter_map(|other| {
                            latest
                                .get(other.id())
                                .map(|s| format!("[{}]: {}", other.name(), s))
                        })
                        .collect();
                    (
                        format!(
                            "Produce a rebuttal to the other agents' positions on: {}",
                            config.task
                        ),
                        Some(statements.join("\n")),
                    )
                };

                let output = invoke_unit(
                    unit,
                    &task,
                    &config.user_id,
                    &config.conversation_id,
                    context.as_deref(),
                    &[],
                    sink,
                )
                .await?;

                latest.insert(unit.id().to_string(), output.output.clone());
                record_unit_output(&mut transcript, &mut results, unit, &output);
            }
        }

        let final_output = self.synthesize(&transcript, &results, config, sink).await?;
        Ok((final_output, transcript, results))
    }

    /// Strict pipeline: each unit's raw output becomes the next unit's
    /// literal task. No synthesis step; an empty roster yields an empty
    /// final output.
    async fn run_chain(
        &self,
        config: &TeamRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<StrategyOutcome> {
        let mut transcript = Vec::new();
        let mut results = Vec::new();
        let mut current = config.task.clone();

        for (i, unit) in self.units.iter().enumerate() {
            let context = if i == 0 {
                config.context.as_deref()
            } else {
                None
            };

            let output = invoke_unit(
                unit,
                &current,
                &config.user_id,
                &config.conversation_id,
                context,
                &[],
                sink,
            )
            .await?;

            record_unit_output(&mut transcript, &mut results, unit, &output);
            current = output.output;
        }

        let final_output = if self.units.is_empty() {
            String::new()
        } else {
            current
        };
        Ok((final_output, transcript, results))
    }

    /// The supervisor decomposes the task into worker assignments, assigned
    /// workers run concurrently, and the supervisor synthesizes a final
    /// answer from their outputs.
    async fn run_supervisor(
        &self,
        config: &TeamRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<StrategyOutcome> {
        let supervisor = match &self.definition.supervisor_id {
            Some(id) => self.by_id.get(id),
            None => self.units.first(),
        }
        .ok_or_else(|| EnsembleError::Team("Supervisor agent not found".to_string()))?;

        let mut transcript = Vec::new();
        let mut results = Vec::new();

        let workers: Vec<String> = self
            .units
            .iter()
            .filter(|unit| unit.id() != supervisor.id())
            .map(|unit| format!("- {} ({}): {}", unit.id(), unit.name(), unit.persona().role))
            .collect();
        let decompose_task = format!(
            "Decompose the following task into subtasks for your workers.\n\
             Task: {}\n\nWorkers:\n{}\n\n\
             Reply with a JSON array of {{\"agent_id\": \"...\", \"subtask\": \"...\"}} assignments.",
            config.task,
            workers.join("\n")
        );

        let plan = invoke_unit(
            supervisor,
            &decompose_task,
            &config.user_id,
            &config.conversation_id,
            config.context.as_deref(),
            &[],
            sink,
        )
        .await?;
        record_unit_output(&mut transcript, &mut results, supervisor, &plan);

        // The plan is an untrusted payload: a malformed or missing array
        // yields no assignments and the supervisor synthesizes alone.
        let mut assignments: Vec<(AgentUnit, String)> = Vec::new();
        if let Some(value) = first_json_array(&plan.output) {
            if let Some(items) = value.as_array() {
                for item in items {
                    let (Some(agent_id), Some(subtask)) =
                        (item["agent_id"].as_str(), item["subtask"].as_str())
                    else {
                        continue;
                    };
                    match self.by_id.get(agent_id) {
                        Some(unit) => assignments.push((unit.clone(), subtask.to_string())),
                        None => {
                            warn!(agent_id, "Skipping assignment to unknown agent");
                        }
                    }
                }
            }
        } else {
            warn!(
                team_id = %self.definition.id,
                "Unparseable supervisor plan, proceeding to synthesis without workers"
            );
        }

        let worker_runs = assignments.iter().map(|(unit, subtask)| {
            invoke_unit(
                unit,
                subtask,
                &config.user_id,
                &config.conversation_id,
                None,
                &[],
                sink,
            )
        });
        let worker_outputs = join_all(worker_runs).await;

        for ((unit, _), output) in assignments.iter().zip(worker_outputs) {
            let output = output?;
            record_unit_output(&mut transcript, &mut results, unit, &output);
        }

        if let Some(tx) = sink {
            let _ = tx
                .send(ProgressEvent::SynthesisStart {
                    synthesizer_id: supervisor.id().to_string(),
                })
                .await;
        }

        let worker_summary = results[1..]
            .iter()
            .map(|r| format!("## {}\n\n{}", r.agent_name, r.output))
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = [
            ChatMessage::system(&supervisor.persona().system_prompt),
            ChatMessage::user(format!(
                "Original task: {}\n\nWorker results:\n\n{}\n\n\
                 Synthesize a final answer to the original task.",
                config.task, worker_summary
            )),
        ];
        let completion = self
            .llm
            .complete(&messages, &[], &CallOptions::default())
            .await?;

        Ok((completion.text, transcript, results))
    }

    /// Shared synthesis over a strategy's recorded results.
    async fn synthesize(
        &self,
        transcript: &[TranscriptEntry],
        results: &[AgentResult],
        config: &TeamRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<String> {
        let successful: Vec<&AgentResult> = results.iter().filter(|r| r.is_success()).collect();
        let synthesizer = self
            .definition
            .synthesizer_id
            .as_ref()
            .and_then(|id| self.by_id.get(id));

        synthesize_results(
            &self.llm,
            synthesizer,
            &config.task,
            &config.user_id,
            &config.conversation_id,
            &successful,
            &render_transcript(transcript),
            sink,
        )
        .await
    }
}
