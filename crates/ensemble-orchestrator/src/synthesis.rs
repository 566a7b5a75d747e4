//! The shared synthesis rule used by team strategies and the swarm's
//! `synthesize` aggregation.

use crate::roster::{invoke_unit, EventSink};
use ensemble_agent::{AgentUnit, CallOptions, LlmClient};
use ensemble_core::{AgentResult, ChatMessage, EnsembleResult, ProgressEvent};

/// Produces one final answer from multiple units' successful results.
///
/// Zero results yield the empty string and a single result is returned
/// verbatim; only with two or more does an actual synthesis call happen,
/// through the designated synthesizer unit when one exists, otherwise
/// through a direct completion.
pub(crate) async fn synthesize_results(
    llm: &LlmClient,
    synthesizer: Option<&AgentUnit>,
    task: &str,
    user_id: &str,
    conversation_id: &str,
    successful: &[&AgentResult],
    context: &str,
    sink: EventSink<'_>,
) -> EnsembleResult<String> {
    match successful.len() {
        0 => Ok(String::new()),
        1 => Ok(successful[0].output.clone()),
        _ => match synthesizer {
            Some(unit) => {
                if let Some(tx) = sink {
                    let _ = tx
                        .send(ProgressEvent::SynthesisStart {
                            synthesizer_id: unit.id().to_string(),
                        })
                        .await;
                }
                let instruction = format!(
                    "Synthesize the agents' contributions into one final answer \
                     to the original task: {task}"
                );
                let output = invoke_unit(
                    unit,
                    &instruction,
                    user_id,
                    conversation_id,
                    Some(context),
                    &[],
                    sink,
                )
                .await?;
                Ok(output.output)
            }
            None => {
                if let Some(tx) = sink {
                    let _ = tx
                        .send(ProgressEvent::SynthesisStart {
                            synthesizer_id: "system".to_string(),
                        })
                        .await;
                }
                let combined = successful
                    .iter()
                    .map(|r| format!("## {}\n\n{}", r.agent_name, r.output))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let messages = [
                    ChatMessage::system(
                        "You are a synthesis agent. Combine the agents' contributions \
                         into one coherent final answer.",
                    ),
                    ChatMessage::user(format!("Task: {task}\n\nContributions:\n\n{combined}")),
                ];
                let completion = llm
                    .complete(&messages, &[], &CallOptions::default())
                    .await?;
                Ok(completion.text)
            }
        },
    }
}
