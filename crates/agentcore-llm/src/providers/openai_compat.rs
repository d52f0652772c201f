//! OpenAI-Compatible Chat Completions adapter (OpenAI, and any gateway that mirrors its
//! `/chat/completions` streaming wire format — Groq, Together, local vLLM servers, etc).

use super::parse_retry_after_ms;
use crate::provider::{LlmError, LlmResult, LlmStream, ProviderAdapter};
use crate::sse::{parse_sse, SseEvent};
use crate::types::{LlmContent, LlmRequest};
use agentcore_types::{FinishReason, StreamEvent, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Default per-call HTTP request timeout (§5: "OpenAI-compatible 10 000 ms").
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

pub struct OpenAiCompatAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
}

impl OpenAiCompatAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn name(&self) -> &str {
        "openai_compat"
    }

    async fn stream(&self, request: LlmRequest, cancel: CancellationToken) -> LlmResult<LlmStream> {
        let mut messages: Vec<ChatMessage> = Vec::new();
        if let Some(system) = &request.system {
            messages.push(ChatMessage { role: "system".to_string(), content: Some(system.clone()), tool_calls: None, tool_call_id: None });
        }
        for m in &request.messages {
            let blocks = match &m.content {
                LlmContent::Text(s) => {
                    messages.push(ChatMessage { role: m.role.clone(), content: Some(s.clone()), tool_calls: None, tool_call_id: None });
                    continue;
                }
                LlmContent::Blocks(blocks) => blocks,
            };

            // Tool results become one "tool"-role message per result; everything else
            // (text, tool_use) collapses into a single message of the original role.
            let tool_results: Vec<_> = blocks
                .iter()
                .filter_map(|b| match b {
                    crate::types::ContentBlock::ToolResult { tool_use_id, content, .. } => {
                        Some((tool_use_id.clone(), content.clone()))
                    }
                    _ => None,
                })
                .collect();
            if !tool_results.is_empty() {
                for (tool_call_id, content) in tool_results {
                    messages.push(ChatMessage { role: "tool".to_string(), content: Some(content), tool_calls: None, tool_call_id: Some(tool_call_id) });
                }
                continue;
            }

            let text = blocks
                .iter()
                .filter_map(|b| match b {
                    crate::types::ContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            let tool_calls: Vec<_> = blocks
                .iter()
                .filter_map(|b| match b {
                    crate::types::ContentBlock::ToolUse { id, name, input } => Some(serde_json::json!({
                        "id": id,
                        "type": "function",
                        "function": { "name": name, "arguments": input.to_string() },
                    })),
                    _ => None,
                })
                .collect();

            messages.push(ChatMessage {
                role: m.role.clone(),
                content: if text.is_empty() && !tool_calls.is_empty() { None } else { Some(text) },
                tool_calls: if tool_calls.is_empty() { None } else { Some(serde_json::json!(tool_calls)) },
                tool_call_id: None,
            });
        }

        let body = ChatRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| ChatTool {
                        r#type: "function".to_string(),
                        function: ChatFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect()
            }),
        };

        debug!(model = %body.model, "sending openai-compatible request");

        let request_fut = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = tokio::time::timeout(self.request_timeout, request_fut) => {
                match result {
                    Ok(resp) => resp?,
                    Err(_) => return Err(LlmError::Timeout),
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after_ms(response.headers());
            let body_text = response.text().await.unwrap_or_default();
            error!(%status, body = %body_text, "openai-compatible request failed");
            let mut err = LlmError::from_status(status.as_u16(), &body_text);
            if let LlmError::RateLimit { retry_after_ms: slot } = &mut err {
                *slot = retry_after_ms;
            }
            return Err(err);
        }

        let byte_stream = response.bytes_stream().map(|r| r.map_err(LlmError::NetworkError));
        let sse = parse_sse(byte_stream);
        Ok(Box::pin(translate(sse, cancel)))
    }
}

fn translate(
    sse: impl futures::Stream<Item = LlmResult<SseEvent>> + Send + 'static,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = LlmResult<StreamEvent>> + Send {
    async_stream::stream! {
        tokio::pin!(sse);
        let mut started = false;
        // OpenAI's delta-level tool call indices don't carry a stable id past the first
        // chunk; key by index and remember the id we synthesized on first sight.
        let mut tool_ids: HashMap<u32, String> = HashMap::new();
        let mut usage = Usage::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    yield Err(LlmError::Cancelled);
                    return;
                }
                item = sse.next() => item,
            };
            let Some(event) = next else { return };
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    yield Err(e);
                    continue;
                }
            };

            if event.data == "[DONE]" {
                yield Ok(StreamEvent::Finish { reason: FinishReason::Stop, usage });
                return;
            }

            let chunk: ChatChunk = match serde_json::from_str(&event.data) {
                Ok(c) => c,
                Err(_) => continue,
            };

            if !started {
                started = true;
                yield Ok(StreamEvent::StreamStart { id: chunk.id.clone(), model: chunk.model.clone() });
            }

            if let Some(u) = chunk.usage {
                usage.add(&Usage::from(u));
            }

            let Some(choice) = chunk.choices.into_iter().next() else { continue };

            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    yield Ok(StreamEvent::TextDelta { text: content });
                }
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let id = match tool_ids.get(&tc.index) {
                    Some(id) => id.clone(),
                    None => {
                        let id = tc.id.clone().unwrap_or_else(|| format!("call_{}", tc.index));
                        tool_ids.insert(tc.index, id.clone());
                        let name = tc.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default();
                        yield Ok(StreamEvent::ToolCallStart { id: id.clone(), name });
                        id
                    }
                };
                if let Some(args) = tc.function.and_then(|f| f.arguments) {
                    if !args.is_empty() {
                        yield Ok(StreamEvent::ToolCallDelta { id, args_delta: args });
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                for id in tool_ids.values() {
                    yield Ok(StreamEvent::ToolCallEnd { id: id.clone() });
                }
                let reason = map_finish_reason(&reason);
                yield Ok(StreamEvent::StepFinish { reason, usage });
            }
        }
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "tool_calls" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct ChatTool {
    r#type: String,
    function: ChatFunction,
}

#[derive(Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatChunk {
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

/// OpenAI's wire field names, separate from our normalized `Usage` so a missing/renamed
/// field here can't break deserialization of the rest of the chunk.
#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl From<ChatUsage> for Usage {
    fn from(u: ChatUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
struct ChatChoice {
    delta: ChatDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCallDelta>>,
}

#[derive(Deserialize)]
struct ChatToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<ChatFunctionDelta>,
}

#[derive(Deserialize)]
struct ChatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
