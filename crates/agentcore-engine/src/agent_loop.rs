//! The think -> call tools -> observe -> think loop, driven by `Session::process_input`.
//!
//! Each round: drain steering messages, build a request from history, stream the response
//! racing every event against the session's `CancellationToken`, finalize into an Assistant
//! turn, check for tool calls, dispatch them through the Loop Detector and Truncation
//! Pipeline, and append the results before looping again.

use crate::context::ContextTracker;
use crate::loop_detector::LoopDetector;
use crate::steering::SteeringQueue;
use crate::truncation;
use agentcore_llm::{Client, ContentBlock, LlmContent, LlmMessage, LlmRequest, LlmTool, StreamAccumulator};
use agentcore_tools::Dispatcher;
use agentcore_types::{
    ContentPart, Error, FinishReason, PendingToolCall, Result, SessionEvent, Turn,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Everything `process_input` needs that isn't already on the `Session` value itself,
/// borrowed for the duration of one call so `Session`'s fields stay behind one lock each.
pub struct LoopContext<'a> {
    pub session_id: &'a str,
    pub client: &'a Client,
    pub dispatcher: &'a Dispatcher,
    pub provider: &'a str,
    pub model: &'a str,
    pub system_prompt: Option<&'a str>,
    pub tool_defs: Vec<LlmTool>,
    pub supports_parallel_tool_calls: bool,
    pub max_turns: usize,
    pub max_tool_rounds_per_input: usize,
    pub tool_limits: &'a agentcore_types::ToolLimitsTable,
    pub reasoning_effort: Option<agentcore_types::ReasoningEffort>,
}

/// Maps a substrate `LlmError` to the session-level error taxonomy (§7): authentication and
/// context-length failures are named distinctly so `Session::submit` can log and surface a
/// precise cause; everything else collapses to `StreamError`/`NetworkError`.
pub fn map_llm_error(err: agentcore_llm::LlmError) -> Error {
    use agentcore_llm::LlmError as LE;
    match err {
        LE::Authentication(m) => Error::Authentication(m),
        LE::AccessDenied(m) => Error::AccessDenied(m),
        LE::ContextLength(m) => Error::ContextLength(m),
        LE::NetworkError(e) => Error::NetworkError(e.to_string()),
        LE::Configuration(m) => Error::Configuration(m),
        other => Error::StreamError(other.to_string()),
    }
}

/// Pure mapping from a substrate `StreamEvent` to the `SessionEvent`s observable on the
/// session's outbound stream. `ToolCallStart` always carries empty args (9c): arguments are
/// only complete once the stream ends, so consumers must wait for the post-execution
/// `ToolCallEnd` for the final value.
pub fn map_stream_event(event: &agentcore_types::StreamEvent) -> Option<SessionEvent> {
    use agentcore_types::StreamEvent as SE;
    match event {
        SE::StreamStart { .. } => Some(SessionEvent::AssistantTextStart),
        SE::TextDelta { text } => Some(SessionEvent::AssistantTextDelta { text: text.clone() }),
        SE::ThinkingDelta { text } => Some(SessionEvent::ThinkingDelta { text: text.clone() }),
        SE::ToolCallStart { id, name } => {
            Some(SessionEvent::ToolCallStart { id: id.clone(), name: name.clone(), args: serde_json::json!({}) })
        }
        SE::ToolCallDelta { .. } | SE::StepFinish { .. } => None,
        SE::ToolCallEnd { .. } => None,
        SE::Finish { .. } => Some(SessionEvent::AssistantTextEnd),
    }
}

/// Runs one `submit()`'s worth of think/act rounds. Returns `Ok(())` on natural completion
/// (no more tool calls, or a turn/tool-round limit reached) and `Err` on a fatal-to-session
/// error (auth failure, exhausted retries, stream error). Abort is not an error: the caller
/// observes it via `cancel.is_cancelled()` around each call and stops appending to history.
#[allow(clippy::too_many_arguments)]
pub async fn process_input(
    ctx: &LoopContext<'_>,
    history: &mut Vec<Turn>,
    steering: &mut SteeringQueue,
    loop_detector: &mut LoopDetector,
    tracker: &mut ContextTracker,
    emit: impl Fn(SessionEvent),
    cancel: &CancellationToken,
) -> Result<()> {
    let mut turns_this_session = count_user_turns(history);
    let mut tool_rounds_this_input = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        for msg in steering.drain_steering() {
            tracker.record(msg.len());
            history.push(Turn::Steering { text: msg });
        }

        let request = build_request(ctx, history);

        let stream = ctx
            .client
            .stream(request, cancel.clone())
            .await
            .map_err(map_llm_error)?;
        tokio::pin!(stream);

        let mut acc = StreamAccumulator::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                ev = stream.next() => ev,
            };
            let Some(event) = next else {
                break;
            };
            if cancel.is_cancelled() {
                return Ok(());
            }
            let event = event.map_err(map_llm_error)?;
            if let Some(session_event) = map_stream_event(&event) {
                emit(session_event);
            }
            acc.process(event);
        }

        if cancel.is_cancelled() {
            return Ok(());
        }

        let response = acc.finalize();
        let content = assistant_content(&response);
        let char_len: usize = content.iter().map(content_part_len).sum();
        history.push(Turn::Assistant { content: content.clone() });
        tracker.record(char_len);
        if let Some(fraction) = tracker.check() {
            emit(SessionEvent::ContextWarning { fraction });
        }

        turns_this_session += 1;

        let calls = tool_calls_in(&content);
        if calls.is_empty() {
            break;
        }
        if tool_rounds_this_input >= ctx.max_tool_rounds_per_input {
            emit(SessionEvent::TurnLimit { reason: "max_tool_rounds".to_string() });
            break;
        }
        if turns_this_session >= ctx.max_turns {
            emit(SessionEvent::TurnLimit { reason: "max_turns".to_string() });
            break;
        }

        let results = ctx.dispatcher.dispatch(&calls, ctx.supports_parallel_tool_calls, cancel.clone()).await;

        let mut entries = Vec::with_capacity(results.len());
        let mut total_output_len = 0usize;
        for (call, result) in calls.iter().zip(results.into_iter()) {
            emit(SessionEvent::ToolCallEnd {
                id: result.id.clone(),
                name: call.name.clone(),
                output: result.output.clone(),
                is_error: result.is_error,
            });

            let fingerprint = LoopDetector::fingerprint(&call.args);
            loop_detector.record(&call.name, &fingerprint);

            let truncated = truncation::truncate(&result.output, &call.name, ctx.tool_limits);
            total_output_len += truncated.len();
            entries.push(agentcore_types::ToolCallResult { id: result.id, output: truncated, is_error: result.is_error });
        }

        if let Some(warning) = loop_detector.check() {
            emit(SessionEvent::LoopDetection { message: warning.clone() });
            steering.steer(format!("Loop detection: {warning}. Adjust your approach."));
        }

        history.push(Turn::ToolResults { entries });
        tracker.record(total_output_len);
        if let Some(fraction) = tracker.check() {
            emit(SessionEvent::ContextWarning { fraction });
        }

        tool_rounds_this_input += 1;
    }

    Ok(())
}

fn count_user_turns(history: &[Turn]) -> usize {
    history.iter().filter(|t| matches!(t, Turn::User { .. })).count()
}

fn content_part_len(part: &ContentPart) -> usize {
    match part {
        ContentPart::Text { text } => text.len(),
        ContentPart::Thinking { text, .. } => text.len(),
        ContentPart::ToolCall { name, args, .. } => name.len() + args.to_string().len(),
        _ => 0,
    }
}

fn assistant_content(response: &agentcore_llm::LlmResponse) -> Vec<ContentPart> {
    let mut parts = Vec::new();
    if !response.thinking.is_empty() {
        parts.push(ContentPart::Thinking { text: response.thinking.clone(), signature: None });
    }
    if !response.text.is_empty() {
        parts.push(ContentPart::Text { text: response.text.clone() });
    }
    for call in &response.tool_calls {
        parts.push(ContentPart::ToolCall { id: call.id.clone(), name: call.name.clone(), args: call.parse_arguments() });
    }
    parts
}

fn tool_calls_in(content: &[ContentPart]) -> Vec<PendingToolCall> {
    content
        .iter()
        .filter_map(|p| match p {
            ContentPart::ToolCall { id, name, args } => {
                Some(PendingToolCall { id: id.clone(), name: name.clone(), args: args.clone() })
            }
            _ => None,
        })
        .collect()
}

fn build_request(ctx: &LoopContext<'_>, history: &[Turn]) -> LlmRequest {
    LlmRequest {
        provider: ctx.provider.to_string(),
        model: ctx.model.to_string(),
        messages: history.iter().map(turn_to_message).collect(),
        tools: if ctx.tool_defs.is_empty() { None } else { Some(ctx.tool_defs.clone()) },
        system: ctx.system_prompt.map(str::to_string),
        reasoning_effort: ctx.reasoning_effort,
        ..Default::default()
    }
}

fn turn_to_message(turn: &Turn) -> LlmMessage {
    match turn {
        Turn::User { text } => LlmMessage { role: "user".into(), content: LlmContent::Text(text.clone()) },
        Turn::Steering { text } => LlmMessage { role: "user".into(), content: LlmContent::Text(text.clone()) },
        Turn::System { text } => LlmMessage { role: "system".into(), content: LlmContent::Text(text.clone()) },
        Turn::Assistant { content } => {
            let blocks = content
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(ContentBlock::Text { text: text.clone() }),
                    ContentPart::ToolCall { id, name, args } => {
                        Some(ContentBlock::ToolUse { id: id.clone(), name: name.clone(), input: args.clone() })
                    }
                    _ => None,
                })
                .collect();
            LlmMessage { role: "assistant".into(), content: LlmContent::Blocks(blocks) }
        }
        Turn::ToolResults { entries } => {
            let blocks = entries
                .iter()
                .map(|e| ContentBlock::ToolResult {
                    tool_use_id: e.id.clone(),
                    content: e.output.clone(),
                    is_error: e.is_error.then_some(true),
                })
                .collect();
            LlmMessage { role: "user".into(), content: LlmContent::Blocks(blocks) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::StreamEvent as SE;

    #[test]
    fn tool_call_start_carries_empty_args() {
        let event = SE::ToolCallStart { id: "1".into(), name: "bash".into() };
        match map_stream_event(&event).unwrap() {
            SessionEvent::ToolCallStart { args, .. } => assert_eq!(args, serde_json::json!({})),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stream_start_maps_to_text_start() {
        let event = SE::StreamStart { id: "r1".into(), model: "m".into() };
        assert!(matches!(map_stream_event(&event), Some(SessionEvent::AssistantTextStart)));
    }

    #[test]
    fn finish_maps_to_text_end() {
        let event = SE::Finish { reason: FinishReason::Stop, usage: Default::default() };
        assert!(matches!(map_stream_event(&event), Some(SessionEvent::AssistantTextEnd)));
    }

    #[test]
    fn internal_events_produce_no_session_event() {
        assert!(map_stream_event(&SE::ToolCallDelta { id: "1".into(), args_delta: "{}".into() }).is_none());
        assert!(map_stream_event(&SE::ToolCallEnd { id: "1".into() }).is_none());
        assert!(map_stream_event(&SE::StepFinish { reason: FinishReason::Stop, usage: Default::default() }).is_none());
    }

    #[test]
    fn count_user_turns_ignores_other_kinds() {
        let history = vec![
            Turn::User { text: "hi".into() },
            Turn::Assistant { content: vec![] },
            Turn::User { text: "again".into() },
            Turn::Steering { text: "nudge".into() },
        ];
        assert_eq!(count_user_turns(&history), 2);
    }
}
