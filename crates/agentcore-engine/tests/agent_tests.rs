//! End-to-end scenarios driving a `Session` against a fake `ProviderAdapter` that replays a
//! fixed `Vec<StreamEvent>`.

use agentcore_engine::{Session, SessionConfig};
use agentcore_llm::{Client, LlmRequest, LlmResult, LlmStream, ProviderAdapter};
use agentcore_tools::{Environment, LocalEnvironment, SubagentRuntime};
use agentcore_types::{FinishReason, SessionEvent, SessionState, StreamEvent, Turn};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Replays the same fixed event sequence on every `stream()` call.
struct ScriptedAdapter {
    events: Vec<StreamEvent>,
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "fake"
    }

    async fn stream(&self, _req: LlmRequest, _cancel: CancellationToken) -> LlmResult<LlmStream> {
        let events = self.events.clone();
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

/// Always emits the same single tool call, forever — used for the turn-limit scenario.
struct AlwaysToolCallAdapter;

#[async_trait]
impl ProviderAdapter for AlwaysToolCallAdapter {
    fn name(&self) -> &str {
        "fake"
    }

    async fn stream(&self, _req: LlmRequest, _cancel: CancellationToken) -> LlmResult<LlmStream> {
        let events = vec![
            StreamEvent::StreamStart { id: "r".into(), model: "m".into() },
            StreamEvent::ToolCallStart { id: "c1".into(), name: "bash".into() },
            StreamEvent::ToolCallDelta { id: "c1".into(), args_delta: "{\"command\":\"echo\"}".into() },
            StreamEvent::ToolCallEnd { id: "c1".into() },
            StreamEvent::Finish { reason: FinishReason::ToolCalls, usage: Default::default() },
        ];
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

/// Cancels the session's own abort token the moment the first `TextDelta` has been sent into
/// the stream, modeling "abort fires mid-stream, after the consumer has observed one event".
struct AbortMidStreamAdapter {
    cancel_on_first_delta: CancellationToken,
}

#[async_trait]
impl ProviderAdapter for AbortMidStreamAdapter {
    fn name(&self) -> &str {
        "fake"
    }

    async fn stream(&self, _req: LlmRequest, _cancel: CancellationToken) -> LlmResult<LlmStream> {
        let token = self.cancel_on_first_delta.clone();
        let s = async_stream::stream! {
            yield Ok(StreamEvent::StreamStart { id: "r".into(), model: "m".into() });
            yield Ok(StreamEvent::TextDelta { text: "partial".into() });
            token.cancel();
            // A real provider stream would keep going; cancellation is expected to cut the
            // loop off before these are ever polled.
            yield Ok(StreamEvent::TextDelta { text: " more".into() });
            yield Ok(StreamEvent::Finish { reason: FinishReason::Stop, usage: Default::default() });
        };
        Ok(Box::pin(s))
    }
}

fn env() -> Arc<dyn Environment> {
    Arc::new(LocalEnvironment::new(std::env::temp_dir()))
}

fn config() -> SessionConfig {
    SessionConfig { provider: "fake".into(), model: "m".into(), ..Default::default() }
}

async fn drain(stream: &mut (impl futures::Stream<Item = Result<SessionEvent, String>> + Unpin)) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(Some(ev)) = tokio::time::timeout(std::time::Duration::from_millis(200), stream.next()).await {
        out.push(ev.unwrap());
    }
    out
}

#[tokio::test]
async fn single_tool_round_then_exits() {
    let client = Arc::new(Client::new().register(Arc::new(ScriptedAdapter {
        events: vec![
            StreamEvent::StreamStart { id: "r1".into(), model: "m".into() },
            StreamEvent::TextDelta { text: "ok".into() },
            StreamEvent::ToolCallStart { id: "c1".into(), name: "read_file".into() },
            StreamEvent::ToolCallDelta { id: "c1".into(), args_delta: "{\"file_path\":\"/a\"}".into() },
            StreamEvent::ToolCallEnd { id: "c1".into() },
            StreamEvent::Finish { reason: FinishReason::ToolCalls, usage: Default::default() },
        ],
    })));

    let session = Session::new(config(), env(), client, 0).await;
    let mut stream = session.subscribe().unwrap();

    session.submit("read the file").await.unwrap();
    let events = drain(&mut stream).await;

    assert!(events.iter().any(|e| matches!(e, SessionEvent::AssistantTextDelta { text } if text == "ok")));
    assert!(events.iter().any(|e| matches!(e, SessionEvent::ToolCallStart { name, .. } if name == "read_file")));
    let tool_end = events.iter().find_map(|e| match e {
        SessionEvent::ToolCallEnd { id, name, is_error, .. } if id == "c1" => Some((name.clone(), *is_error)),
        _ => None,
    });
    assert!(tool_end.is_some());
    assert_eq!(session.state().await, SessionState::Idle);
}

#[tokio::test]
async fn loop_detected_after_five_identical_tool_rounds() {
    let client = Arc::new(Client::new().register(Arc::new(AlwaysToolCallAdapter)));
    let session = Session::new(
        SessionConfig { max_tool_rounds_per_input: 100, max_turns: 100, ..config() },
        env(),
        client,
        0,
    )
    .await;
    let mut stream = session.subscribe().unwrap();

    session.submit("loop please").await.unwrap();
    let events = drain(&mut stream).await;

    let warning = events.iter().find_map(|e| match e {
        SessionEvent::LoopDetection { message } => Some(message.clone()),
        _ => None,
    });
    let warning = warning.expect("expected a LoopDetection event");
    assert!(warning.contains("bash:"));
    assert!(warning.contains("repeated 5"));

    let history = session.history().await;
    let has_steering = history.iter().any(|t| matches!(t, Turn::Steering { text } if text.starts_with("Loop detection:")));
    assert!(has_steering);
}

#[tokio::test]
async fn turn_limit_breaks_after_configured_rounds() {
    let client = Arc::new(Client::new().register(Arc::new(AlwaysToolCallAdapter)));
    let session = Session::new(
        SessionConfig { max_tool_rounds_per_input: 2, max_turns: 100, ..config() },
        env(),
        client,
        0,
    )
    .await;
    let mut stream = session.subscribe().unwrap();

    session.submit("keep going").await.unwrap();
    let events = drain(&mut stream).await;

    let tool_end_count = events.iter().filter(|e| matches!(e, SessionEvent::ToolCallEnd { .. })).count();
    assert_eq!(tool_end_count, 2);
    assert!(events.iter().any(|e| matches!(e, SessionEvent::TurnLimit { reason } if reason == "max_tool_rounds")));
    assert_eq!(session.state().await, SessionState::Idle);
}

#[tokio::test]
async fn context_warning_fires_once_threshold_crossed() {
    let client = Arc::new(Client::new().register(Arc::new(ScriptedAdapter {
        events: vec![
            StreamEvent::StreamStart { id: "r1".into(), model: "m".into() },
            StreamEvent::TextDelta { text: "ack".into() },
            StreamEvent::Finish { reason: FinishReason::Stop, usage: Default::default() },
        ],
    })));
    let session = Session::new(SessionConfig { context_window_tokens: Some(100), ..config() }, env(), client, 0).await;
    let mut stream = session.subscribe().unwrap();

    // 350 chars => 350/(4*100) = 0.875 >= default 0.8 threshold.
    let input = "x".repeat(350);
    session.submit(&input).await.unwrap();
    let events = drain(&mut stream).await;

    let warnings: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::ContextWarning { fraction } => Some(*fraction),
            _ => None,
        })
        .collect();
    assert!(!warnings.is_empty());
    assert!((warnings[0] - 0.875).abs() < 1e-9);
}

#[tokio::test]
async fn abort_during_stream_stops_without_appending_assistant_turn() {
    let cancel_trigger = CancellationToken::new();
    let client = Arc::new(Client::new().register(Arc::new(AbortMidStreamAdapter { cancel_on_first_delta: cancel_trigger.clone() })));
    let session = Session::new(config(), env(), client, 0).await;
    let mut stream = session.subscribe().unwrap();

    let session_for_abort = session.clone();
    let abort_flag = Arc::new(Mutex::new(false));
    let abort_flag_task = abort_flag.clone();
    let watcher = tokio::spawn(async move {
        cancel_trigger.cancelled().await;
        session_for_abort.abort().await;
        *abort_flag_task.lock().unwrap() = true;
    });

    let _ = session.submit("go").await;
    watcher.await.unwrap();
    assert!(*abort_flag.lock().unwrap());

    let events = drain(&mut stream).await;
    assert!(events.iter().any(|e| matches!(e, SessionEvent::SessionEnd { .. })));

    let history = session.history().await;
    assert!(!history.iter().any(|t| matches!(t, Turn::Assistant { .. })));
    assert_eq!(session.state().await, SessionState::Closed);

    // Second abort is a no-op: still exactly one SessionEnd overall.
    session.abort().await;
    let session_end_count = events.iter().filter(|e| matches!(e, SessionEvent::SessionEnd { .. })).count();
    assert_eq!(session_end_count, 1);
}

#[tokio::test]
async fn subagent_spawn_wait_is_cached_then_close() {
    let client = Arc::new(Client::new().register(Arc::new(ScriptedAdapter {
        events: vec![
            StreamEvent::StreamStart { id: "r1".into(), model: "m".into() },
            StreamEvent::TextDelta { text: "child done".into() },
            StreamEvent::Finish { reason: FinishReason::Stop, usage: Default::default() },
        ],
    })));
    let session = Session::new(config(), env(), client, 0).await;

    session.spawn("child-1", "do the thing", None, None).await.unwrap();

    let first = tokio::time::timeout(std::time::Duration::from_secs(2), session.wait("child-1"))
        .await
        .expect("wait should not hang")
        .unwrap();
    assert!(first.success);
    assert_eq!(first.output, "child done");

    // A second wait() on the same id can't resubscribe to the child's (already-drained)
    // event stream, so it must come back from the cached result instead of erroring.
    let second = session.wait("child-1").await.unwrap();
    assert_eq!(second.output, first.output);
    assert!(second.success);
    assert_eq!(second.turns_used, first.turns_used);

    session.close("child-1").await.unwrap();
}
