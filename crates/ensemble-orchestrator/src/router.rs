use crate::json::first_json_object;
use crate::types::{RouteResult, RouterDefinition};
use ensemble_agent::{AgentUnit, CallOptions, LlmClient};
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult, ProgressEvent};
use ensemble_skills::{IntegrationRegistry, SkillRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Routes each incoming message to exactly one unit of its roster, by
/// keyword scoring or by a model classification call, then delegates to it.
///
/// The unit map is built once at construction and never mutated; a router
/// may serve concurrent `route` calls.
#[derive(Clone)]
pub struct AgentRouter {
    definition: Arc<RouterDefinition>,
    units: Arc<Vec<AgentUnit>>,
    by_id: Arc<HashMap<String, AgentUnit>>,
    llm: Arc<LlmClient>,
}

impl AgentRouter {
    /// Materializes the roster and validates the default agent.
    pub fn new(
        definition: RouterDefinition,
        llm: Arc<LlmClient>,
        skills: Arc<SkillRegistry>,
        integrations: Arc<IntegrationRegistry>,
    ) -> EnsembleResult<Self> {
        let (units, by_id) =
            crate::roster::materialize_units(&definition.agents, &llm, &skills, &integrations);

        if !by_id.contains_key(&definition.default_agent_id) {
            return Err(EnsembleError::Router(format!(
                "Default agent not found: {}",
                definition.default_agent_id
            )));
        }

        Ok(Self {
            definition: Arc::new(definition),
            units: Arc::new(units),
            by_id: Arc::new(by_id),
            llm,
        })
    }

    fn default_unit(&self) -> AgentUnit {
        // Presence is validated at construction.
        self.by_id[&self.definition.default_agent_id].clone()
    }

    /// Classifies a message and runs the chosen unit with it as the task.
    pub async fn route(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        context: Option<&str>,
    ) -> EnsembleResult<RouteResult> {
        let (unit, reason) = self.classify(message).await?;
        info!(router_id = %self.definition.id, agent_id = %unit.id(), reason = %reason, "Routing message");

        let output = unit
            .run(message, user_id, conversation_id, context, &[])
            .await?;

        Ok(RouteResult {
            agent_id: unit.id().to_string(),
            agent_name: unit.name().to_string(),
            output: output.output,
            duration_ms: output.duration_ms,
            routing_reason: reason,
        })
    }

    /// Streaming variant of [`route`](Self::route): one `handoff` event
    /// naming the chosen unit, then that unit's events forwarded unchanged.
    pub async fn route_stream(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        context: Option<&str>,
    ) -> EnsembleResult<mpsc::Receiver<ProgressEvent>> {
        let (unit, reason) = self.classify(message).await?;
        info!(router_id = %self.definition.id, agent_id = %unit.id(), reason = %reason, "Routing message (stream)");

        let (tx, rx) = mpsc::channel::<ProgressEvent>(64);
        let message = message.to_string();
        let user_id = user_id.to_string();
        let conversation_id = conversation_id.to_string();
        let context = context.map(str::to_string);

        tokio::spawn(async move {
            let _ = tx
                .send(ProgressEvent::Handoff {
                    from: "router".to_string(),
                    to: unit.id().to_string(),
                    reason,
                })
                .await;

            let mut events =
                unit.run_stream(&message, &user_id, &conversation_id, context.as_deref(), &[]);
            while let Some(event) = events.recv().await {
                let _ = tx.send(event).await;
            }
        });

        Ok(rx)
    }

    async fn classify(&self, message: &str) -> EnsembleResult<(AgentUnit, String)> {
        if self.definition.use_ai_routing {
            self.classify_with_model(message).await
        } else {
            Ok(self.classify_by_keywords(message))
        }
    }

    /// Keyword scoring: the highest `can_handle` score wins, ties broken by
    /// roster order; all-zero scores fall back to the default agent.
    fn classify_by_keywords(&self, message: &str) -> (AgentUnit, String) {
        let mut best: Option<(f32, &AgentUnit, String)> = None;
        for unit in self.units.iter() {
            let suitability = unit.can_handle(message);
            let beats_current = best
                .as_ref()
                .map_or(true, |(score, _, _)| suitability.score > *score);
            if beats_current {
                best = Some((suitability.score, unit, suitability.reason));
            }
        }

        match best {
            Some((score, unit, reason)) if score > 0.0 => (unit.clone(), reason),
            _ => (
                self.default_unit(),
                "Default agent — no keyword match".to_string(),
            ),
        }
    }

    /// Model classification: one completion asked to return
    /// `{"agent_id", "reason"}`. The reply is an untrusted payload; any
    /// parse failure or unknown id degrades to the default agent.
    async fn classify_with_model(&self, message: &str) -> EnsembleResult<(AgentUnit, String)> {
        let roster: Vec<String> = self
            .units
            .iter()
            .map(|u| format!("- {} ({}): {}", u.id(), u.name(), u.persona().role))
            .collect();
        let messages = [
            ChatMessage::system(format!(
                "You route user messages to the best-suited agent.\n\
                 Agents:\n{}\n\n\
                 Reply with JSON: {{\"agent_id\": \"...\", \"reason\": \"...\"}}",
                roster.join("\n")
            )),
            ChatMessage::user(message),
        ];

        let completion = self
            .llm
            .complete(&messages, &[], &CallOptions::default())
            .await?;

        let Some(choice) = first_json_object(&completion.text) else {
            warn!(router_id = %self.definition.id, "Unparseable routing reply, using default agent");
            return Ok((
                self.default_unit(),
                "AI routing fallback to default agent".to_string(),
            ));
        };

        let unit = choice["agent_id"]
            .as_str()
            .and_then(|id| self.by_id.get(id));
        match unit {
            Some(unit) => {
                let reason = choice["reason"]
                    .as_str()
                    .unwrap_or("AI routing")
                    .to_string();
                Ok((unit.clone(), reason))
            }
            None => {
                warn!(router_id = %self.definition.id, "Routing reply named no known agent, using default");
                Ok((
                    self.default_unit(),
                    "AI routing fallback to default agent".to_string(),
                ))
            }
        }
    }
}
