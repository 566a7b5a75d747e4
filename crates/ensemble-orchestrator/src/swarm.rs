use crate::roster::{materialize_units, EventSink};
use crate::synthesis::synthesize_results;
use crate::types::{Aggregation, SwarmDefinition, SwarmRunConfig, SwarmRunResult};
use ensemble_agent::{AgentUnit, CallOptions, LlmClient};
use ensemble_core::{
    AgentResult, ChatMessage, EnsembleResult, ProgressEvent,
};
use ensemble_skills::{IntegrationRegistry, SkillRegistry};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Dispatches every roster unit concurrently, enforces per-unit timeouts
/// and a minimum-successful-completions threshold, and aggregates the
/// successful outputs.
///
/// Individual unit failures never abort the run; they are captured as
/// failed [`AgentResult`]s. Results arrive in settlement order, not roster
/// order.
#[derive(Clone)]
pub struct SwarmOrchestrator {
    definition: Arc<SwarmDefinition>,
    units: Arc<Vec<AgentUnit>>,
    by_id: Arc<HashMap<String, AgentUnit>>,
    llm: Arc<LlmClient>,
}

impl SwarmOrchestrator {
    /// Materializes the roster into executable units.
    pub fn new(
        definition: SwarmDefinition,
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

    /// Runs the swarm to completion and returns the buffered result.
    pub async fn run(&self, config: SwarmRunConfig) -> EnsembleResult<SwarmRunResult> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        info!(
            swarm_id = %self.definition.id,
            %run_id,
            agent_count = self.units.len(),
            "Swarm run started"
        );

        let (final_output, agent_results) = self.execute(&config, None).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(swarm_id = %self.definition.id, %run_id, duration_ms, "Swarm run finished");

        Ok(SwarmRunResult {
            swarm_id: self.definition.id.clone(),
            task: config.task,
            final_output,
            agent_results,
            duration_ms,
        })
    }

    /// Streaming variant of [`run`](Self::run): `swarm_start`, each unit's
    /// events forwarded as they arrive, `synthesis_start` only for the
    /// `synthesize` aggregation, and a terminal `complete`.
    pub fn run_stream(&self, config: SwarmRunConfig) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel::<ProgressEvent>(64);
        let this = self.clone();

        tokio::spawn(async move {
            let start = Instant::now();
            match this.execute(&config, Some(&tx)).await {
                Ok((final_output, _)) => {
                    let _ = tx
                        .send(ProgressEvent::Complete {
                            final_output,
                            duration_ms: start.elapsed().as_millis() as u64,
                        })
                        .await;
                }
                Err(e) => {
                    error!(swarm_id = %this.definition.id, error = %e, "Swarm stream aborted");
                }
            }
        });

        rx
    }

    async fn execute(
        &self,
        config: &SwarmRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<(String, Vec<AgentResult>)> {
        if let Some(tx) = sink {
            let _ = tx
                .send(ProgressEvent::SwarmStart {
                    swarm_id: self.definition.id.clone(),
                    agent_count: self.units.len(),
                })
                .await;
        }

        let timeout = Duration::from_millis(self.definition.agent_timeout_ms);
        let mut in_flight: FuturesUnordered<_> = self
            .units
            .iter()
            .map(|unit| {
                let task = config
                    .agent_tasks
                    .get(unit.id())
                    .cloned()
                    .unwrap_or_else(|| config.task.clone());
                run_one(unit.clone(), task, config, timeout, sink)
            })
            .collect();

        // Settlement order, not roster order.
        let mut results = Vec::with_capacity(self.units.len());
        while let Some(result) = in_flight.next().await {
            results.push(result);
        }

        let success_count = results.iter().filter(|r| r.is_success()).count();
        let final_output = if success_count < self.definition.min_completions {
            warn!(
                swarm_id = %self.definition.id,
                success_count,
                min_completions = self.definition.min_completions,
                "Swarm below completion threshold"
            );
            format!(
                "Swarm failed: completed {success_count}/{}",
                self.definition.min_completions
            )
        } else {
            self.aggregate(&results, config, sink).await?
        };

        Ok((final_output, results))
    }

    async fn aggregate(
        &self,
        results: &[AgentResult],
        config: &SwarmRunConfig,
        sink: EventSink<'_>,
    ) -> EnsembleResult<String> {
        let successful: Vec<&AgentResult> = results.iter().filter(|r| r.is_success()).collect();

        match self.definition.aggregation {
            Aggregation::Concatenate => Ok(concatenate(&successful)),
            Aggregation::Vote => Ok(vote(&successful)),
            Aggregation::Merge => merge(&successful),
            Aggregation::Join => Ok(successful
                .iter()
                .map(|r| r.output.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            Aggregation::Best => self.pick_best(&successful, config).await,
            Aggregation::Synthesize => {
                let synthesizer = self
                    .definition
                    .synthesizer_id
                    .as_ref()
                    .and_then(|id| self.by_id.get(id));
                let context = successful
                    .iter()
                    .map(|r| format!("[{}]: {}", r.agent_name, r.output))
                    .collect::<Vec<_>>()
                    .join("\n");
                synthesize_results(
                    &self.llm,
                    synthesizer,
                    &config.task,
                    &config.user_id,
                    &config.conversation_id,
                    &successful,
                    &context,
                    sink,
                )
                .await
            }
        }
    }

    /// One completion choosing the single best candidate output, verbatim.
    async fn pick_best(
        &self,
        successful: &[&AgentResult],
        config: &SwarmRunConfig,
    ) -> EnsembleResult<String> {
        let candidates = successful
            .iter()
            .enumerate()
            .map(|(i, r)| format!("Candidate {} ({}):\n{}", i + 1, r.agent_name, r.output))
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = [
            ChatMessage::system(
                "You select the single best answer from the candidates. \
                 Reply with the chosen candidate's text verbatim, nothing else.",
            ),
            ChatMessage::user(format!("Task: {}\n\n{}", config.task, candidates)),
        ];
        let completion = self
            .llm
            .complete(&messages, &[], &CallOptions::default())
            .await?;
        Ok(completion.text)
    }
}

/// Runs one unit against the shared deadline, capturing any failure as a
/// result instead of propagating it.
async fn run_one(
    unit: AgentUnit,
    task: String,
    config: &SwarmRunConfig,
    timeout: Duration,
    sink: EventSink<'_>,
) -> AgentResult {
    let agent_id = unit.id().to_string();
    let agent_name = unit.name().to_string();

    let Some(tx) = sink else {
        // The unit runs inside its own task: timing out on the join handle
        // abandons the wait but leaves the call in flight, and its eventual
        // result is discarded on arrival.
        let start = Instant::now();
        let user_id = config.user_id.clone();
        let conversation_id = config.conversation_id.clone();
        let handle = tokio::spawn(async move {
            unit.run(&task, &user_id, &conversation_id, None, &[]).await
        });

        return match tokio::time::timeout(timeout, handle).await {
            Err(_) => {
                warn!(agent_id = %agent_id, "Agent timed out");
                AgentResult::failure(agent_id, agent_name, "Agent timeout", timeout.as_millis() as u64)
            }
            Ok(Err(_join_error)) => AgentResult::failure(
                agent_id,
                agent_name,
                "Unknown error",
                start.elapsed().as_millis() as u64,
            ),
            Ok(Ok(Err(e))) => AgentResult::failure(
                agent_id,
                agent_name,
                e.to_string(),
                start.elapsed().as_millis() as u64,
            ),
            Ok(Ok(Ok(output))) => {
                AgentResult::success(agent_id, agent_name, output.output, output.duration_ms)
            }
        };
    };

    // Streamed: forward the unit's events until its terminal event or the
    // deadline. Dropping the receiver on timeout stops the wait only; the
    // underlying call keeps running detached.
    let deadline = tokio::time::Instant::now() + timeout;
    let mut events = unit.run_stream(
        &task,
        &config.user_id,
        &config.conversation_id,
        None,
        &[],
    );

    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_) => {
                warn!(agent_id = %agent_id, "Agent timed out");
                let _ = tx
                    .send(ProgressEvent::AgentError {
                        agent_id: agent_id.clone(),
                        error: "Agent timeout".to_string(),
                    })
                    .await;
                return AgentResult::failure(
                    agent_id,
                    agent_name,
                    "Agent timeout",
                    timeout.as_millis() as u64,
                );
            }
            Ok(None) => {
                return AgentResult::failure(agent_id, agent_name, "Unknown error", 0);
            }
            Ok(Some(event)) => {
                let outcome = match &event {
                    ProgressEvent::AgentDone {
                        output,
                        duration_ms,
                        ..
                    } => Some(AgentResult::success(
                        &agent_id,
                        &agent_name,
                        output,
                        *duration_ms,
                    )),
                    ProgressEvent::AgentError { error, .. } => Some(AgentResult::failure(
                        &agent_id,
                        &agent_name,
                        error,
                        0,
                    )),
                    _ => None,
                };
                let _ = tx.send(event).await;
                if let Some(result) = outcome {
                    return result;
                }
            }
        }
    }
}

/// Markdown sections per agent, separated by horizontal rules.
fn concatenate(successful: &[&AgentResult]) -> String {
    successful
        .iter()
        .map(|r| format!("## {}\n\n{}", r.agent_name, r.output))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Majority vote over trimmed, lowercased outputs; ties break toward the
/// first occurrence. The winner's original text is reported together with
/// its vote count.
fn vote(successful: &[&AgentResult]) -> String {
    let total = successful.len();
    // (normalized, count, original text of first occurrence)
    let mut tally: Vec<(String, usize, &str)> = Vec::new();
    for result in successful {
        let normalized = result.output.trim().to_lowercase();
        match tally.iter_mut().find(|(key, _, _)| *key == normalized) {
            Some(entry) => entry.1 += 1,
            None => tally.push((normalized, 1, result.output.as_str())),
        }
    }

    let mut winner: Option<&(String, usize, &str)> = None;
    for entry in &tally {
        if winner.map_or(true, |w| entry.1 > w.1) {
            winner = Some(entry);
        }
    }

    match winner {
        None => String::new(),
        Some((normalized, votes, original)) => {
            let text = if original.trim().is_empty() {
                normalized.clone()
            } else {
                (*original).to_string()
            };
            format!("{text}\n\nVotes: {votes}/{total}")
        }
    }
}

/// Shallow JSON merge: object outputs merge key-by-key with later agents
/// overriding earlier ones; anything else lands under the agent's name.
fn merge(successful: &[&AgentResult]) -> EnsembleResult<String> {
    let mut merged = serde_json::Map::new();
    for result in successful {
        match serde_json::from_str::<serde_json::Value>(&result.output) {
            Ok(serde_json::Value::Object(object)) => {
                for (key, value) in object {
                    merged.insert(key, value);
                }
            }
            _ => {
                merged.insert(
                    result.agent_name.clone(),
                    serde_json::Value::String(result.output.clone()),
                );
            }
        }
    }
    Ok(serde_json::to_string_pretty(&serde_json::Value::Object(
        merged,
    ))?)
}
