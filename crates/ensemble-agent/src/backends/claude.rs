use super::{CallOptions, LlmBackend};
use crate::config::ModelConfig;
use crate::llm::Completion;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use ensemble_core::{ChatMessage, EnsembleError, EnsembleResult, Role, ToolInvocation};
use ensemble_skills::SkillDescriptor;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Claude (Anthropic) API backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    /// Creates a backend for the given model config.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    // The messages API takes system text as a top-level field, so system
    // entries are folded out of the conversational list.
    fn build_body(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
        stream: bool,
    ) -> EnsembleResult<serde_json::Value> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let api_messages: Vec<WireMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": opts.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": opts.temperature.unwrap_or(self.config.temperature),
            "messages": api_messages,
        });

        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }

        if !tools.is_empty() {
            let wire_tools: Vec<WireTool> = tools
                .iter()
                .map(|t| WireTool {
                    name: &t.id,
                    description: &t.description,
                    input_schema: &t.parameters_schema,
                })
                .collect();
            body["tools"] = serde_json::to_value(&wire_tools)?;
        }

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        Ok(body)
    }

    async fn send(&self, body: &serde_json::Value) -> EnsembleResult<reqwest::Response> {
        let url = format!("{}/v1/messages", self.config.base_url());
        self.http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[SkillDescriptor],
        opts: &CallOptions,
    ) -> EnsembleResult<Completion> {
        let body = self.build_body(messages, tools, opts, false)?;
        let resp = self.send(&body).await?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(EnsembleError::Http(format!(
                "Claude API error {status}: {resp_body}"
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
        let body = self.build_body(messages, tools, opts, true)?;
        let resp = self.send(&body).await?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EnsembleError::Http(format!(
                "Claude API error {status}: {error_body}"
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut stream = byte_stream;
            let mut buffer = String::new();
            let mut full_text = String::new();
            let mut invocations: Vec<ToolInvocation> = Vec::new();
            // index -> (id, name, accumulated args json)
            let mut open_blocks: std::collections::HashMap<u64, (String, String, String)> =
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

                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    match event["type"].as_str().unwrap_or("") {
                        "content_block_start" => {
                            let index = event["index"].as_u64().unwrap_or(0);
                            let block = &event["content_block"];
                            if block["type"].as_str() == Some("tool_use") {
                                let id = block["id"].as_str().unwrap_or_default().to_string();
                                let name = block["name"].as_str().unwrap_or_default().to_string();
                                open_blocks.insert(index, (id, name, String::new()));
                            }
                        }

                        "content_block_delta" => {
                            let index = event["index"].as_u64().unwrap_or(0);
                            let delta = &event["delta"];
                            match delta["type"].as_str().unwrap_or("") {
                                "text_delta" => {
                                    if let Some(text) = delta["text"].as_str() {
                                        full_text.push_str(text);
                                        let _ = tx
                                            .send(StreamEvent::TextDelta {
                                                text: text.to_string(),
                                            })
                                            .await;
                                    }
                                }
                                "input_json_delta" => {
                                    if let Some(partial) = delta["partial_json"].as_str() {
                                        if let Some(block) = open_blocks.get_mut(&index) {
                                            block.2.push_str(partial);
                                        }
                                    }
                                }
                                _ => {}
                            }
                        }

                        "content_block_stop" => {
                            let index = event["index"].as_u64().unwrap_or(0);
                            if let Some((id, name, args_json)) = open_blocks.remove(&index) {
                                let arguments: serde_json::Value = serde_json::from_str(&args_json)
                                    .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
                                invocations.push(ToolInvocation {
                                    id,
                                    skill_id: name,
                                    arguments,
                                });
                            }
                        }

                        "message_stop" => {
                            let _ = tx.send(StreamEvent::Done).await;
                        }

                        _ => {}
                    }
                }
            }

            Ok(Completion {
                text: full_text,
                invocations,
            })
        });

        Ok((rx, handle))
    }
}

// -- wire types --

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

fn parse_response(body: &serde_json::Value) -> EnsembleResult<Completion> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| EnsembleError::Agent("Missing content in Claude response".into()))?;

    let mut text_parts = Vec::new();
    let mut invocations = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_string());
                }
            }
            Some("tool_use") => {
                invocations.push(ToolInvocation {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    skill_id: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    Ok(Completion {
        text: text_parts.join("\n"),
        invocations,
    })
}
