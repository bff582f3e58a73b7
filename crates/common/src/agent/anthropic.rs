//! Anthropic Messages API client with tool use

use super::{ReasoningDecision, ReasoningProvider, ReasoningRequest, ToolCall, TranscriptEntry};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    tools: Vec<ToolSpec<'a>>,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct ToolSpec<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Serialize, PartialEq)]
struct Message {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "Anthropic provider requires llm.api_key".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }

    async fn make_request(&self, body: &MessagesRequest<'_>) -> Result<MessagesResponse> {
        let response = self
            .client
            .post(format!("{}/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let code = status.as_u16();
            return Err(AppError::Upstream {
                message: format!("Anthropic API error {}: {}", status, error_text),
                retryable: status.is_server_error() || code == 429 || code == 408,
            });
        }

        response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::UpstreamTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AppError::from(err)
        }
    }
}

#[async_trait]
impl ReasoningProvider for AnthropicProvider {
    async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningDecision> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &request.system,
            tools: request
                .tools
                .iter()
                .map(|t| ToolSpec {
                    name: &t.name,
                    description: &t.description,
                    input_schema: &t.input_schema,
                })
                .collect(),
            messages: build_messages(&request.transcript),
        };

        let response = self.make_request(&body).await?;
        tracing::debug!(
            model = %self.model,
            stop_reason = ?response.stop_reason,
            blocks = response.content.len(),
            "Reasoning call completed"
        );
        Ok(decide(response))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Render the transcript as Messages API turns.
///
/// Consecutive tool results share one user message, as the API requires.
fn build_messages(transcript: &[TranscriptEntry]) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();

    for entry in transcript {
        match entry {
            TranscriptEntry::User { text } => messages.push(Message {
                role: "user",
                content: vec![json!({"type": "text", "text": text})],
            }),
            TranscriptEntry::AssistantText { text } => messages.push(Message {
                role: "assistant",
                content: vec![json!({"type": "text", "text": text})],
            }),
            TranscriptEntry::AssistantToolCalls { preamble, calls } => {
                let mut content = Vec::with_capacity(calls.len() + 1);
                if let Some(text) = preamble.as_deref().filter(|t| !t.is_empty()) {
                    content.push(json!({"type": "text", "text": text}));
                }
                content.extend(calls.iter().map(|call| {
                    json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    })
                }));
                messages.push(Message {
                    role: "assistant",
                    content,
                });
            }
            TranscriptEntry::ToolResult {
                call_id,
                is_error,
                content,
                ..
            } => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": call_id,
                    "content": content.to_string(),
                    "is_error": is_error,
                });
                match messages.last_mut() {
                    Some(last) if last.role == "user" && is_tool_result_message(last) => {
                        last.content.push(block)
                    }
                    _ => messages.push(Message {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
        }
    }

    messages
}

fn is_tool_result_message(message: &Message) -> bool {
    message
        .content
        .iter()
        .all(|block| block["type"] == "tool_result")
}

fn decide(response: MessagesResponse) -> ReasoningDecision {
    let mut text = Vec::new();
    let mut calls = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text: t } => text.push(t),
            ContentBlock::ToolUse { id, name, input } => calls.push(ToolCall {
                id,
                name,
                arguments: input,
            }),
            ContentBlock::Other => {}
        }
    }

    let text = text.join("\n");
    if calls.is_empty() {
        ReasoningDecision::Respond { text }
    } else {
        ReasoningDecision::CallTools {
            preamble: (!text.is_empty()).then_some(text),
            calls,
        }
    }
}
