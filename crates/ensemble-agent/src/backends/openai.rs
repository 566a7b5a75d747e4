use super::{CallOptions, LlmBackend};
use crate::config::{LlmProvider, ModelConfig};
use crate::llm::Completion;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult, Role, ToolInvocation};
use ensemble_skills::SkillDescriptor;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Creates a backend for the given model config.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_body(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
        stream: bool,
    ) -> serde_json::Value {
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::System => "system",
                        Role::Assistant => "assistant",
                        Role::User | Role::Tool => "user",
                    },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": opts.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": opts.temperature.unwrap_or(self.config.temperature),
            "messages": api_messages,
        });

        if !tools.is_empty() {
            let wire_tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.id,
                            "description": t.description,
                            "parameters": t.parameters_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(wire_tools);
        }

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        body
    }

    async fn send(&self, body: &serde_json::Value) -> EnsembleResult<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let mut request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires attribution headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request = request
                .header("HTTP-Referer", "https://github.com/ensemble-ai/ensemble")
                .header("X-Title", "Ensemble");
        }

        request
            .json(body)
            .send()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<Completion> {
        let body = self.build_body(messages, tools, opts, false);
        let resp = self.send(&body).await?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(EnsembleError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_response(&resp_body)
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<EnsembleResult<Completion>>,
    )> {
        let body = self.build_body(messages, tools, opts, true);
        let resp = self.send(&body).await?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EnsembleError::Http(format!(
                "OpenAI API error {status}: {error_body}"
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut stream = byte_stream;
            let mut buffer = String::new();
            let mut full_text = String::new();
            // index -> (id, name, accumulated args json)
            let mut open_calls: std::collections::HashMap<u64, (String, String, String)> =
                std::collections::HashMap::new();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: format!("Stream read error: {e}"),
                            })
                            .await;
                        return Err(EnsembleError::Http(format!("Stream read error: {e}")));
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };

                    if data == "[DONE]" {
                        let _ = tx.send(StreamEvent::Done).await;
                        continue;
                    }

                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    let delta = &event["choices"][0]["delta"];

                    if let Some(content) = delta["content"].as_str() {
                        if !content.is_empty() {
                            full_text.push_str(content);
                            let _ = tx
                                .send(StreamEvent::TextDelta {
                                    text: content.to_string(),
                                })
                                .await;
                        }
                    }

                    if let Some(tool_calls) = delta["tool_calls"].as_array() {
                        for tc in tool_calls {
                            let idx = tc["index"].as_u64().unwrap_or(0);

                            if let Some(id) = tc["id"].as_str() {
                                let name = tc["function"]["name"]
                                    .as_str()
                                    .unwrap_or_default()
                                    .to_string();
                                open_calls.insert(idx, (id.to_string(), name, String::new()));
                            }

                            if let Some(args_delta) = tc["function"]["arguments"].as_str() {
                                if let Some(entry) = open_calls.get_mut(&idx) {
                                    entry.2.push_str(args_delta);
                                }
                            }
                        }
                    }
                }
            }

            let invocations: Vec<ToolInvocation> = open_calls
                .into_values()
                .map(|(id, name, args_json)| ToolInvocation {
                    id,
                    skill_id: name,
                    arguments: serde_json::from_str(&args_json).unwrap_or_default(),
                })
                .collect();

            Ok(Completion {
                text: full_text,
                invocations,
            })
        });

        Ok((rx, handle))
    }
}

fn parse_response(body: &serde_json::Value) -> EnsembleResult<Completion> {
    let message = &body["choices"][0]["message"];
    let text = message["content"].as_str().unwrap_or_default().to_string();

    let invocations = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    Some(ToolInvocation {
                        id: tc["id"].as_str()?.to_string(),
                        skill_id: tc["function"]["name"].as_str()?.to_string(),
                        arguments: serde_json::from_str(tc["function"]["arguments"].as_str()?)
                            .unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Completion { text, invocations })
}
