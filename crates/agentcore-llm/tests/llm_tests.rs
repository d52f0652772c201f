//! Integration tests for the LLM streaming substrate: request/content types, adapter
//! registration and resolution, and a scripted end-to-end stream through `Client`.

use agentcore_llm::*;
use agentcore_types::{FinishReason, StreamEvent, Usage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Binds an ephemeral localhost port and accepts one connection without ever writing a
/// response, so a client waiting on that connection's headers hangs until timed out or
/// cancelled. Used to exercise the timeout/cancel races around the initial `.send()` without
/// a real provider or a mocking crate, neither of which this workspace depends on.
async fn hanging_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let _stream = stream;
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });
    addr
}

// ===========================================================================
// LlmRequest
// ===========================================================================

#[test]
fn llm_request_default() {
    let req = LlmRequest::default();
    assert_eq!(req.provider, "anthropic");
    assert!(req.messages.is_empty());
    assert!(req.tools.is_none());
    assert_eq!(req.max_tokens, Some(8192));
    assert!(req.temperature.is_none());
    assert!(req.system.is_none());
    assert!(req.reasoning_effort.is_none());
}

#[test]
fn llm_request_omits_none_fields_from_json() {
    let req = LlmRequest { model: "m".into(), ..Default::default() };
    let json = serde_json::to_string(&req).unwrap();
    assert!(!json.contains("tools"));
    assert!(!json.contains("temperature"));
    assert!(!json.contains("system"));
    assert!(!json.contains("reasoning_effort"));
}

#[test]
fn llm_request_carries_reasoning_effort_when_set() {
    let req = LlmRequest { reasoning_effort: Some(agentcore_types::ReasoningEffort::High), ..Default::default() };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains(r#""reasoning_effort":"high""#));
}

// ===========================================================================
// LlmContent
// ===========================================================================

#[test]
fn llm_content_from_str_and_string() {
    let a: LlmContent = "hello".into();
    let b: LlmContent = String::from("hello").into();
    assert!(matches!(a, LlmContent::Text(ref s) if s == "hello"));
    assert!(matches!(b, LlmContent::Text(ref s) if s == "hello"));
}

#[test]
fn llm_content_text_serializes_as_bare_string() {
    let c = LlmContent::Text("hi".into());
    let json = serde_json::to_string(&c).unwrap();
    assert_eq!(json, r#""hi""#);
    let back: LlmContent = serde_json::from_str(&json).unwrap();
    assert!(matches!(back, LlmContent::Text(ref s) if s == "hi"));
}

#[test]
fn llm_content_blocks_round_trips() {
    let c = LlmContent::Blocks(vec![ContentBlock::Text { text: "hi".into() }]);
    let json = serde_json::to_string(&c).unwrap();
    let back: LlmContent = serde_json::from_str(&json).unwrap();
    match back {
        LlmContent::Blocks(blocks) => assert_eq!(blocks.len(), 1),
        other => panic!("unexpected {other:?}"),
    }
}

// ===========================================================================
// ContentBlock
// ===========================================================================

#[test]
fn content_block_tool_use_round_trips() {
    let b = ContentBlock::ToolUse { id: "c1".into(), name: "read_file".into(), input: serde_json::json!({"path": "/a"}) };
    let json = serde_json::to_string(&b).unwrap();
    assert!(json.contains(r#""type":"tool_use""#));
    let back: ContentBlock = serde_json::from_str(&json).unwrap();
    match back {
        ContentBlock::ToolUse { id, name, input } => {
            assert_eq!(id, "c1");
            assert_eq!(name, "read_file");
            assert_eq!(input["path"], "/a");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn content_block_tool_result_omits_is_error_when_none() {
    let b = ContentBlock::ToolResult { tool_use_id: "c1".into(), content: "ok".into(), is_error: None };
    let json = serde_json::to_string(&b).unwrap();
    assert!(!json.contains("is_error"));
}

#[test]
fn content_block_tool_result_carries_is_error_when_some() {
    let b = ContentBlock::ToolResult { tool_use_id: "c1".into(), content: "boom".into(), is_error: Some(true) };
    let json = serde_json::to_string(&b).unwrap();
    assert!(json.contains(r#""is_error":true"#));
}

// ===========================================================================
// LlmTool / LlmMessage
// ===========================================================================

#[test]
fn llm_tool_round_trips() {
    let tool = LlmTool {
        name: "read_file".into(),
        description: "Read a file".into(),
        input_schema: serde_json::json!({"type": "object"}),
    };
    let json = serde_json::to_string(&tool).unwrap();
    let back: LlmTool = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, "read_file");
}

#[test]
fn llm_message_round_trips() {
    let msg = LlmMessage { role: "user".into(), content: LlmContent::Text("hi".into()) };
    let json = serde_json::to_string(&msg).unwrap();
    let back: LlmMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back.role, "user");
    assert!(matches!(back.content, LlmContent::Text(ref s) if s == "hi"));
}

// ===========================================================================
// AccumulatedToolCall
// ===========================================================================

#[test]
fn accumulated_tool_call_parses_valid_json() {
    let tc = AccumulatedToolCall { id: "1".into(), name: "read_file".into(), arguments: r#"{"path":"/a"}"#.into() };
    assert_eq!(tc.parse_arguments()["path"], "/a");
}

#[test]
fn accumulated_tool_call_falls_back_to_empty_object_on_invalid_json() {
    let tc = AccumulatedToolCall { id: "1".into(), name: "read_file".into(), arguments: "not json".into() };
    assert_eq!(tc.parse_arguments(), serde_json::json!({}));
}

// ===========================================================================
// LlmError status mapping
// ===========================================================================

#[test]
fn from_status_maps_known_codes() {
    assert!(matches!(LlmError::from_status(401, "bad key"), LlmError::Authentication(_)));
    assert!(matches!(LlmError::from_status(403, "nope"), LlmError::AccessDenied(_)));
    assert!(matches!(LlmError::from_status(404, "gone"), LlmError::NotFound(_)));
    assert!(matches!(LlmError::from_status(429, ""), LlmError::RateLimit { .. }));
    assert!(matches!(LlmError::from_status(503, "down"), LlmError::Server(_)));
    assert!(matches!(LlmError::from_status(418, "teapot"), LlmError::Provider(_)));
}

#[test]
fn from_status_400_distinguishes_context_length() {
    assert!(matches!(LlmError::from_status(400, "context window exceeded"), LlmError::ContextLength(_)));
    assert!(matches!(LlmError::from_status(400, "missing field"), LlmError::InvalidRequest(_)));
}

#[test]
fn only_rate_limit_and_server_are_retryable() {
    assert!(LlmError::RateLimit { retry_after_ms: None }.retryable());
    assert!(LlmError::Server("boom".into()).retryable());
    assert!(!LlmError::Authentication("bad".into()).retryable());
    assert!(!LlmError::InvalidRequest("bad".into()).retryable());
}

// ===========================================================================
// Provider adapter construction
// ===========================================================================

#[test]
fn anthropic_adapter_name_and_base_url_override() {
    let adapter = AnthropicAdapter::new("sk-test").with_base_url("http://localhost:9999/v1/messages");
    assert_eq!(adapter.name(), "anthropic");
}

#[test]
fn openai_compat_adapter_defaults_to_openai_base_url() {
    let adapter = OpenAiCompatAdapter::new("sk-test");
    assert_eq!(adapter.name(), "openai_compat");
}

// ===========================================================================
// Client + scripted adapter, end to end
// ===========================================================================

/// Replays a fixed event sequence, ignoring the request it's given.
struct ScriptedAdapter {
    name: &'static str,
    events: Vec<StreamEvent>,
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn stream(&self, _request: LlmRequest, _cancel: CancellationToken) -> LlmResult<LlmStream> {
        let events = self.events.clone();
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

fn scripted_events() -> Vec<StreamEvent> {
    vec![
        StreamEvent::StreamStart { id: "r1".into(), model: "m".into() },
        StreamEvent::TextDelta { text: "pong".into() },
        StreamEvent::Finish { reason: FinishReason::Stop, usage: Usage::default() },
    ]
}

#[tokio::test]
async fn client_stream_routes_to_registered_adapter_by_provider_name() {
    let client = Client::new().register(Arc::new(ScriptedAdapter { name: "fake", events: scripted_events() }));
    let request = LlmRequest { provider: "fake".into(), model: "m".into(), ..Default::default() };

    use futures::StreamExt;
    let stream = client.stream(request, CancellationToken::new()).await.unwrap();
    tokio::pin!(stream);

    let mut text = String::new();
    while let Some(event) = stream.next().await {
        if let StreamEvent::TextDelta { text: t } = event.unwrap() {
            text.push_str(&t);
        }
    }
    assert_eq!(text, "pong");
}

#[tokio::test]
async fn client_complete_folds_scripted_stream_via_accumulator() {
    let client = Client::new().register(Arc::new(ScriptedAdapter { name: "fake", events: scripted_events() }));
    let request = LlmRequest { provider: "fake".into(), model: "m".into(), ..Default::default() };

    let response = client.complete(request, CancellationToken::new()).await.unwrap();
    assert_eq!(response.text, "pong");
    assert_eq!(response.stop_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn client_stream_unknown_provider_is_configuration_error() {
    let client = Client::new().register(Arc::new(ScriptedAdapter { name: "fake", events: vec![] }));
    let request = LlmRequest { provider: "other".into(), model: "m".into(), ..Default::default() };

    let result = client.stream(request, CancellationToken::new()).await;
    assert!(matches!(result, Err(LlmError::Configuration(_))));
}

// ===========================================================================
// Adapter-level timeout and cancellation races around the initial `.send()`
// ===========================================================================

#[tokio::test]
async fn anthropic_adapter_times_out_when_server_never_responds() {
    let addr = hanging_server().await;
    let adapter = AnthropicAdapter::new("sk-test")
        .with_base_url(format!("http://{addr}/v1/messages"))
        .with_request_timeout(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        adapter.stream(LlmRequest { model: "m".into(), ..Default::default() }, CancellationToken::new()),
    )
    .await
    .expect("adapter should honor its own timeout, not hang the test");

    assert!(matches!(result, Err(LlmError::Timeout)));
}

#[tokio::test]
async fn openai_compat_adapter_times_out_when_server_never_responds() {
    let addr = hanging_server().await;
    let adapter = OpenAiCompatAdapter::new("sk-test")
        .with_base_url(format!("http://{addr}/v1/chat/completions"))
        .with_request_timeout(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        adapter.stream(LlmRequest { model: "m".into(), ..Default::default() }, CancellationToken::new()),
    )
    .await
    .expect("adapter should honor its own timeout, not hang the test");

    assert!(matches!(result, Err(LlmError::Timeout)));
}

#[tokio::test]
async fn anthropic_adapter_cancelled_before_response_is_observed_immediately() {
    let addr = hanging_server().await;
    // A generous request timeout that must never fire — cancellation should win the race.
    let adapter = AnthropicAdapter::new("sk-test")
        .with_base_url(format!("http://{addr}/v1/messages"))
        .with_request_timeout(Duration::from_secs(10));

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        adapter.stream(LlmRequest { model: "m".into(), ..Default::default() }, cancel),
    )
    .await
    .expect("cancellation should cut off the in-flight send, not hang the test");

    assert!(matches!(result, Err(LlmError::Cancelled)));
}

#[tokio::test]
async fn retry_after_beyond_max_delay_surfaces_immediately_through_with_retry() {
    use std::sync::atomic::{AtomicU32, Ordering};

    let policy = RetryPolicy { max_attempts: 5, max_delay_ms: 1_000, ..Default::default() };
    let calls = AtomicU32::new(0);
    let result: LlmResult<()> = retry::with_retry(&policy, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(LlmError::RateLimit { retry_after_ms: Some(60_000) }) }
    })
    .await;

    assert!(matches!(result, Err(LlmError::RateLimit { retry_after_ms: Some(60_000) })));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "must not sleep/retry when retry-after exceeds max_delay_ms");
}
