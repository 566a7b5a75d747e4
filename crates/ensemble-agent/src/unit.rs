use crate::backends::CallOptions;
use crate::llm::LlmClient;
use crate::stream::StreamEvent;
use ensemble_core::{
    AgentPersona, ChatMessage, EnsembleResult, ProgressEvent, TranscriptEntry,
};
use ensemble_skills::{
    HandoffRequest, HandoffSkill, IntegrationRegistry, Skill, SkillContext, SkillDescriptor,
    SkillRegistry, HANDOFF_SKILL_ID,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How well a unit considers itself suited for a free-text task.
#[derive(Debug, Clone)]
pub struct Suitability {
    /// Keyword-overlap score in `0.0..=1.0`.
    pub score: f32,
    /// Human-readable explanation of the score.
    pub reason: String,
}

/// The outcome of one unit invocation.
#[derive(Debug, Clone)]
pub struct UnitOutput {
    /// The generated text.
    pub output: String,
    /// Wall-clock duration of the invocation in milliseconds.
    pub duration_ms: u64,
    /// Delegation signal, when the agent called the handoff tool. The
    /// caller decides whether to act on it; nothing is re-routed here.
    pub handoff: Option<HandoffRequest>,
}

/// Runtime wrapper performing one agent's work for one invocation.
///
/// A unit holds exactly one persona and is stateless across invocations:
/// message lists, toolsets, and results are built fresh every run, so one
/// unit may serve concurrent runs of the same orchestrator.
#[derive(Clone)]
pub struct AgentUnit {
    persona: Arc<AgentPersona>,
    llm: Arc<LlmClient>,
    skills: Arc<SkillRegistry>,
    integrations: Arc<IntegrationRegistry>,
    handoff: Arc<HandoffSkill>,
}

impl AgentUnit {
    /// Wraps a persona into an executable unit.
    pub fn new(
        persona: AgentPersona,
        llm: Arc<LlmClient>,
        skills: Arc<SkillRegistry>,
        integrations: Arc<IntegrationRegistry>,
    ) -> Self {
        Self {
            persona: Arc::new(persona),
            llm,
            skills,
            integrations,
            handoff: Arc::new(HandoffSkill::new()),
        }
    }

    /// The wrapped persona.
    pub fn persona(&self) -> &AgentPersona {
        &self.persona
    }

    /// The persona id.
    pub fn id(&self) -> &str {
        &self.persona.id
    }

    /// The persona display name.
    pub fn name(&self) -> &str {
        &self.persona.name
    }

    pub(crate) fn build_messages(
        &self,
        task: &str,
        context: Option<&str>,
        history: &[TranscriptEntry],
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(&self.persona.system_prompt)];

        if let Some(context) = context {
            messages.push(ChatMessage::system(format!(
                "Context from previous agents or user: {context}"
            )));
        }

        if !history.is_empty() {
            let rendered: Vec<String> = history
                .iter()
                .map(|e| format!("[{} ({})]: {}", e.agent_name, e.role, e.content))
                .collect();
            messages.push(ChatMessage::system(rendered.join("\n")));
        }

        messages.push(ChatMessage::user(task));
        messages
    }

    /// Assembles the tools advertised for one invocation: registered skills
    /// filtered by the persona's `skill_ids`, active integration skills
    /// filtered by `integration_ids` (descriptions prefixed with the
    /// integration name), and the always-present handoff tool.
    pub fn toolset(&self, user_id: &str) -> Vec<SkillDescriptor> {
        let mut tools: Vec<SkillDescriptor> = self
            .skills
            .descriptors()
            .into_iter()
            .filter(|d| {
                self.persona.skill_ids.is_empty() || self.persona.skill_ids.contains(&d.id)
            })
            .collect();

        for instance in self.integrations.active_for_user(user_id) {
            let definition = instance.definition();
            if !self.persona.integration_ids.is_empty()
                && !self.persona.integration_ids.contains(&definition.id)
            {
                continue;
            }
            for skill in &definition.skills {
                let mut descriptor = skill.clone();
                descriptor.description = format!("[{}] {}", definition.name, skill.description);
                tools.push(descriptor);
            }
        }

        tools.push(self.handoff.descriptor().clone());
        tools
    }

    fn call_options(&self) -> CallOptions {
        CallOptions {
            temperature: self.persona.temperature,
            max_tokens: self.persona.max_tokens,
        }
    }

    /// Performs one buffered completion for this persona.
    ///
    /// Backend failures propagate; callers decide whether to isolate them.
    pub async fn run(
        &self,
        task: &str,
        user_id: &str,
        conversation_id: &str,
        context: Option<&str>,
        history: &[TranscriptEntry],
    ) -> EnsembleResult<UnitOutput> {
        let start = Instant::now();
        let messages = self.build_messages(task, context, history);
        let tools = self.toolset(user_id);

        info!(agent_id = %self.persona.id, "Agent invocation started");

        let completion = self
            .llm
            .complete(&messages, &tools, &self.call_options())
            .await?;

        let ctx = SkillContext {
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
        };

        let mut handoff = None;
        for invocation in completion.invocations {
            if invocation.skill_id == HANDOFF_SKILL_ID {
                let output = self.handoff.execute(invocation, &ctx).await?;
                handoff = serde_json::from_value(output.payload).ok();
            } else {
                // Running other tools (and feeding results back to the
                // model) belongs to the host application's agentic loop.
                warn!(
                    agent_id = %self.persona.id,
                    skill = %invocation.skill_id,
                    "Ignoring tool invocation outside the handoff skill"
                );
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(agent_id = %self.persona.id, duration_ms, "Agent invocation finished");

        Ok(UnitOutput {
            output: completion.text,
            duration_ms,
            handoff,
        })
    }

    /// Performs one streamed completion for this persona.
    ///
    /// The returned sequence is lazy, finite, and non-restartable:
    /// `agent_start` immediately, one `agent_chunk` per text fragment in
    /// arrival order, then exactly one of `agent_done` or `agent_error`.
    pub fn run_stream(
        &self,
        task: &str,
        user_id: &str,
        conversation_id: &str,
        context: Option<&str>,
        history: &[TranscriptEntry],
    ) -> mpsc::Receiver<ProgressEvent> {
        info!(
            agent_id = %self.persona.id,
            conversation_id,
            "Agent stream invocation started"
        );
        let (tx, rx) = mpsc::channel::<ProgressEvent>(64);
        let unit = self.clone();
        let task = task.to_string();
        let user_id = user_id.to_string();
        let context = context.map(str::to_string);
        let history = history.to_vec();

        tokio::spawn(async move {
            let start = Instant::now();
            let agent_id = unit.persona.id.clone();

            let _ = tx
                .send(ProgressEvent::AgentStart {
                    agent_id: agent_id.clone(),
                    agent_name: unit.persona.name.clone(),
                })
                .await;

            let messages = unit.build_messages(&task, context.as_deref(), &history);
            let tools = unit.toolset(&user_id);

            let stream = unit
                .llm
                .complete_stream(&messages, &tools, &unit.call_options())
                .await;

            let (mut events, handle) = match stream {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = tx
                        .send(ProgressEvent::AgentError {
                            agent_id,
                            error: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let mut output = String::new();
            while let Some(event) = events.recv().await {
                match event {
                    StreamEvent::TextDelta { text } => {
                        output.push_str(&text);
                        let _ = tx
                            .send(ProgressEvent::AgentChunk {
                                agent_id: agent_id.clone(),
                                chunk: text,
                            })
                            .await;
                    }
                    StreamEvent::Error { message } => {
                        let _ = tx
                            .send(ProgressEvent::AgentError {
                                agent_id,
                                error: message,
                            })
                            .await;
                        return;
                    }
                    StreamEvent::Done => {}
                }
            }

            match handle.await {
                Ok(Ok(_completion)) => {
                    let _ = tx
                        .send(ProgressEvent::AgentDone {
                            agent_id,
                            output,
                            duration_ms: start.elapsed().as_millis() as u64,
                        })
                        .await;
                }
                Ok(Err(e)) => {
                    let _ = tx
                        .send(ProgressEvent::AgentError {
                            agent_id,
                            error: e.to_string(),
                        })
                        .await;
                }
                Err(_) => {
                    let _ = tx
                        .send(ProgressEvent::AgentError {
                            agent_id,
                            error: "Unknown error".to_string(),
                        })
                        .await;
                }
            }
        });

        rx
    }

    /// Scores this unit's suitability for a free-text task by keyword
    /// overlap between the persona role and the task text.
    pub fn can_handle(&self, task: &str) -> Suitability {
        let role_words = words(&self.persona.role);
        let task_words = words(task);

        let matched = role_words.intersection(&task_words).count();
        let total = role_words.len();
        let score = if total == 0 {
            0.0
        } else {
            (matched as f32 / total as f32).min(1.0)
        };

        Suitability {
            score,
            reason: format!("Role keyword overlap: {matched}/{total}"),
        }
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
