/// Anthropic messages API backend.
pub mod claude;
/// OpenAI-compatible chat completions backend.
pub mod openai;

use crate::llm::Completion;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use ensemble_core::{ChatMessage, EnsembleResult};
use ensemble_skills::SkillDescriptor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Per-call overrides a persona may apply on top of the model defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Completion token limit override.
    pub max_tokens: Option<u32>,
}

/// Trait for model provider backends.
///
/// Each provider (Claude, OpenAI, OpenRouter, Groq, ...) implements this
/// trait to handle API communication. To add a new provider: create a module
/// in `backends/`, implement `LlmBackend`, add the variant to `LlmProvider`,
/// and wire it up in `LlmClient::new()`.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One buffered completion over the given message list.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<Completion>;

    /// One streamed completion over the given message list.
    ///
    /// Returns a receiver of [`StreamEvent`]s and a join handle resolving to
    /// the final aggregated completion.
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<EnsembleResult<Completion>>,
    )>;
}
