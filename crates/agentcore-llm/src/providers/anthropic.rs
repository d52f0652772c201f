//! Anthropic Messages API adapter with SSE streaming.

use super::parse_retry_after_ms;
use crate::provider::{LlmError, LlmResult, LlmStream, ProviderAdapter};
use crate::sse::{parse_sse, SseEvent};
use crate::types::{LlmContent, LlmRequest};
use agentcore_types::{FinishReason, StreamEvent, Usage};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default per-call HTTP request timeout (§5: "Anthropic 120 000 ms").
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(120_000);

pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
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
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, request: LlmRequest, cancel: CancellationToken) -> LlmResult<LlmStream> {
        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role.clone(),
                    content: match &m.content {
                        LlmContent::Text(s) => serde_json::json!(s),
                        LlmContent::Blocks(blocks) => serde_json::to_value(blocks).unwrap_or_default(),
                    },
                })
                .collect(),
            max_tokens: request.max_tokens.unwrap_or(8192),
            stream: true,
            system: request.system.clone(),
            tools: request.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect()
            }),
        };

        debug!(model = %body.model, "sending anthropic request");

        let request_fut = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
            error!(%status, body = %body_text, "anthropic request failed");
            let mut err = LlmError::from_status(status.as_u16(), &body_text);
            if let LlmError::RateLimit { retry_after_ms: slot } = &mut err {
                *slot = retry_after_ms.or(Some(60_000));
            }
            return Err(err);
        }

        let byte_stream = response.bytes_stream().map(|r| r.map_err(LlmError::NetworkError));
        let sse = parse_sse(byte_stream);
        let stream = translate(sse, cancel);
        Ok(Box::pin(stream))
    }
}

/// Translates Anthropic's SSE event grammar into the normalized `StreamEvent` grammar,
/// racing each item against cancellation so a mid-stream cancel stops promptly.
fn translate(
    sse: impl futures::Stream<Item = LlmResult<SseEvent>> + Send + 'static,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = LlmResult<StreamEvent>> + Send {
    async_stream::stream! {
        tokio::pin!(sse);
        let mut current_tool_id: Option<String> = None;
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

            match event.event.as_deref() {
                Some("message_start") => {
                    if let Ok(data) = serde_json::from_str::<MessageStart>(&event.data) {
                        yield Ok(StreamEvent::StreamStart { id: data.message.id, model: data.message.model });
                    }
                }
                Some("content_block_start") => {
                    if let Ok(data) = serde_json::from_str::<ContentBlockStart>(&event.data) {
                        if let ContentBlockType::ToolUse { id, name } = data.content_block {
                            current_tool_id = Some(id.clone());
                            yield Ok(StreamEvent::ToolCallStart { id, name });
                        }
                    }
                }
                Some("content_block_delta") => {
                    if let Ok(data) = serde_json::from_str::<ContentBlockDelta>(&event.data) {
                        match data.delta {
                            DeltaType::TextDelta { text } => yield Ok(StreamEvent::TextDelta { text }),
                            DeltaType::ThinkingDelta { thinking } => {
                                yield Ok(StreamEvent::ThinkingDelta { text: thinking })
                            }
                            DeltaType::InputJsonDelta { partial_json } => {
                                if let Some(id) = &current_tool_id {
                                    yield Ok(StreamEvent::ToolCallDelta { id: id.clone(), args_delta: partial_json });
                                }
                            }
                        }
                    }
                }
                Some("content_block_stop") => {
                    if let Some(id) = current_tool_id.take() {
                        yield Ok(StreamEvent::ToolCallEnd { id });
                    }
                }
                Some("message_delta") => {
                    if let Ok(data) = serde_json::from_str::<MessageDelta>(&event.data) {
                        if let Some(u) = data.usage {
                            usage.add(&u);
                        }
                        let reason = map_stop_reason(data.delta.stop_reason.as_deref());
                        yield Ok(StreamEvent::StepFinish { reason, usage });
                    }
                }
                Some("message_stop") => {
                    yield Ok(StreamEvent::Finish { reason: FinishReason::Stop, usage });
                    return;
                }
                Some("error") => {
                    if let Ok(data) = serde_json::from_str::<ErrorEvent>(&event.data) {
                        yield Err(LlmError::StreamError(data.error.message));
                    }
                }
                _ => {}
            }
        }
    }
}

fn map_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("tool_use") => FinishReason::ToolCalls,
        Some("max_tokens") => FinishReason::Length,
        Some(other) => FinishReason::Other(other.to_string()),
        None => FinishReason::Stop,
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Deserialize)]
struct MessageStartInner {
    id: String,
    model: String,
}

#[derive(Deserialize)]
struct ContentBlockStart {
    #[allow(dead_code)]
    index: u32,
    content_block: ContentBlockType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockType {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(rename = "text")]
    #[allow(dead_code)]
    Text { text: String },
    #[serde(rename = "thinking")]
    #[allow(dead_code)]
    Thinking { thinking: String },
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    #[allow(dead_code)]
    index: u32,
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[allow(dead_code)]
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
