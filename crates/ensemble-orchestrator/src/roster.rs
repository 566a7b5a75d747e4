use ensemble_agent::{AgentUnit, LlmClient, UnitOutput};
use ensemble_core::{
    AgentPersona, AgentResult, EnsembleError, EnsembleResult, ProgressEvent, TranscriptEntry,
};
use ensemble_skills::{IntegrationRegistry, SkillRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Optional event destination for streamed runs. `None` means buffered mode.
pub(crate) type EventSink<'a> = Option<&'a mpsc::Sender<ProgressEvent>>;

/// Materializes a roster of personas into executable units.
///
/// Returns the units in roster order plus an id lookup map. Built once per
/// router/orchestrator instance and never mutated afterwards.
pub fn materialize_units(
    personas: &[AgentPersona],
    llm: &Arc<LlmClient>,
    skills: &Arc<SkillRegistry>,
    integrations: &Arc<IntegrationRegistry>,
) -> (Vec<AgentUnit>, HashMap<String, AgentUnit>) {
    let units: Vec<AgentUnit> = personas
        .iter()
        .map(|persona| {
            AgentUnit::new(
                persona.clone(),
                Arc::clone(llm),
                Arc::clone(skills),
                Arc::clone(integrations),
            )
        })
        .collect();

    let by_id = units
        .iter()
        .map(|unit| (unit.id().to_string(), unit.clone()))
        .collect();

    (units, by_id)
}

/// Appends the standard (transcript entry, result) pair after a successful
/// unit invocation.
pub fn record_unit_output(
    transcript: &mut Vec<TranscriptEntry>,
    results: &mut Vec<AgentResult>,
    unit: &AgentUnit,
    output: &UnitOutput,
) {
    transcript.push(TranscriptEntry::new(unit.id(), unit.name(), &output.output));
    results.push(AgentResult::success(
        unit.id(),
        unit.name(),
        &output.output,
        output.duration_ms,
    ));
}

/// Renders a transcript as `[Name]: content` lines for use as shared
/// context.
pub(crate) fn render_transcript(transcript: &[TranscriptEntry]) -> String {
    transcript
        .iter()
        .map(|entry| format!("[{}]: {}", entry.agent_name, entry.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Invokes one unit, buffered or streamed depending on the sink.
///
/// In streamed mode the unit's events are forwarded unchanged and the final
/// `agent_done` output is captured, so both modes see identical tasks,
/// context, and outputs. A unit failure becomes an `Err` either way; in
/// streamed mode the `agent_error` event has already been forwarded by the
/// time the error is returned.
pub(crate) async fn invoke_unit(
    unit: &AgentUnit,
    task: &str,
    user_id: &str,
    conversation_id: &str,
    context: Option<&str>,
    history: &[TranscriptEntry],
    sink: EventSink<'_>,
) -> EnsembleResult<UnitOutput> {
    let Some(tx) = sink else {
        return unit.run(task, user_id, conversation_id, context, history).await;
    };

    let mut events = unit.run_stream(task, user_id, conversation_id, context, history);
    let mut outcome: Option<EnsembleResult<UnitOutput>> = None;

    while let Some(event) = events.recv().await {
        match &event {
            ProgressEvent::AgentDone {
                output,
                duration_ms,
                ..
            } => {
                outcome = Some(Ok(UnitOutput {
                    output: output.clone(),
                    duration_ms: *duration_ms,
                    handoff: None,
                }));
            }
            ProgressEvent::AgentError { error, .. } => {
                outcome = Some(Err(EnsembleError::Agent(error.clone())));
            }
            _ => {}
        }
        let _ = tx.send(event).await;
    }

    outcome.unwrap_or_else(|| {
        Err(EnsembleError::Agent(
            "Stream ended without a terminal event".to_string(),
        ))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn personas() -> Vec<AgentPersona> {
        vec![
            AgentPersona::new("a", "Agent A", "analyst", "You analyze."),
            AgentPersona::new("b", "Agent B", "builder", "You build."),
        ]
    }

    fn registries() -> (Arc<SkillRegistry>, Arc<IntegrationRegistry>) {
        (
            Arc::new(SkillRegistry::new()),
            Arc::new(IntegrationRegistry::new()),
        )
    }

    #[test]
    fn test_materialize_preserves_roster_order() {
        let (skills, integrations) = registries();
        let llm = Arc::new(LlmClient::new(ensemble_agent::ModelConfig {
            provider: ensemble_agent::LlmProvider::OpenAi,
            model_id: "m".to_string(),
            api_key: "k".to_string(),
            api_base_url: None,
            temperature: 0.7,
            max_tokens: 16,
        }));
        let (units, by_id) = materialize_units(&personas(), &llm, &skills, &integrations);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id(), "a");
        assert_eq!(units[1].id(), "b");
        assert!(by_id.contains_key("a") && by_id.contains_key("b"));
    }

    #[test]
    fn test_record_unit_output_appends_pair() {
        let (skills, integrations) = registries();
        let llm = Arc::new(LlmClient::new(ensemble_agent::ModelConfig {
            provider: ensemble_agent::LlmProvider::OpenAi,
            model_id: "m".to_string(),
            api_key: "k".to_string(),
            api_base_url: None,
            temperature: 0.7,
            max_tokens: 16,
        }));
        let (units, _) = materialize_units(&personas(), &llm, &skills, &integrations);

        let mut transcript = Vec::new();
        let mut results = Vec::new();
        let output = UnitOutput {
            output: "findings".to_string(),
            duration_ms: 7,
            handoff: None,
        };
        record_unit_output(&mut transcript, &mut results, &units[0], &output);

        assert_eq!(transcript.len(), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(transcript[0].agent_id, "a");
        assert_eq!(results[0].output, "findings");
        assert!(results[0].is_success());
    }

    #[test]
    fn test_render_transcript_lines() {
        let transcript = vec![
            TranscriptEntry::new("a", "Agent A", "first"),
            TranscriptEntry::new("b", "Agent B", "second"),
        ];
        assert_eq!(
            render_transcript(&transcript),
            "[Agent A]: first\n[Agent B]: second"
        );
    }
}
