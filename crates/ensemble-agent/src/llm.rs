use crate::backends::claude::ClaudeBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::{CallOptions, LlmBackend};
use crate::config::{LlmProvider, ModelConfig};
use crate::stream::StreamEvent;
use ensemble_core::{ChatMessage, EnsembleResult, ToolInvocation};
use ensemble_skills::SkillDescriptor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The aggregated outcome of one completion call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Generated text, already concatenated across content blocks/chunks.
    pub text: String,
    /// Tool invocations the model requested, in emission order.
    pub invocations: Vec<ToolInvocation>,
}

impl Completion {
    /// A text-only completion with no tool invocations.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            invocations: Vec::new(),
        }
    }
}

/// Model client that dispatches to the configured provider backend.
///
/// Uses the [`LlmBackend`] trait to abstract away provider-specific API
/// differences.
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    /// Creates a client for the configured provider.
    pub fn new(config: ModelConfig) -> Self {
        let backend: Box<dyn LlmBackend> = match config.provider {
            LlmProvider::Claude => Box::new(ClaudeBackend::new(config)),
            LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
                Box::new(OpenAiBackend::new(config))
            }
        };
        Self { backend }
    }

    /// Creates a client from a pre-built backend (for tests and custom
    /// providers).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// One buffered completion.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<Completion> {
        self.backend.complete(messages, tools, opts).await
    }

    /// One streamed completion; see [`LlmBackend::complete_stream`].
    pub async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<EnsembleResult<Completion>>,
    )> {
        self.backend.complete_stream(messages, tools, opts).await
    }
}
