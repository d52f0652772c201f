//! Pure fold of a `StreamEvent` sequence into a `LlmResponse`.
//!
//! Used both by `ProviderAdapter::complete`'s default implementation and by tests that
//! replay a fixed event sequence against a fake adapter.

use crate::types::{AccumulatedToolCall, LlmResponse};
use agentcore_types::{FinishReason, StreamEvent, Usage};
use std::collections::HashMap;

#[derive(Default)]
pub struct StreamAccumulator {
    text: String,
    thinking: String,
    pending: HashMap<String, AccumulatedToolCall>,
    order: Vec<String>,
    finished: Vec<AccumulatedToolCall>,
    stop_reason: Option<String>,
    usage: Usage,
    warnings: Vec<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the accumulator. Unknown/unexpected ids (a `ToolCallDelta` or
    /// `ToolCallEnd` with no matching `ToolCallStart`) are tolerated defensively and ignored,
    /// since a malformed adapter should not panic the session loop.
    pub fn process(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::StreamStart { .. } => {}
            StreamEvent::TextDelta { text } => self.text.push_str(&text),
            StreamEvent::ThinkingDelta { text } => self.thinking.push_str(&text),
            StreamEvent::ToolCallStart { id, name } => {
                self.order.push(id.clone());
                self.pending.insert(id.clone(), AccumulatedToolCall { id, name, arguments: String::new() });
            }
            StreamEvent::ToolCallDelta { id, args_delta } => {
                if let Some(call) = self.pending.get_mut(&id) {
                    call.arguments.push_str(&args_delta);
                }
            }
            StreamEvent::ToolCallEnd { id } => {
                if let Some(call) = self.pending.remove(&id) {
                    self.finished.push(call);
                }
            }
            StreamEvent::StepFinish { usage, .. } => {
                self.usage.add(&usage);
            }
            StreamEvent::Finish { reason, usage } => {
                self.usage.add(&usage);
                self.stop_reason = Some(finish_reason_str(&reason));
            }
        }
    }

    /// Finalizes the fold. Any tool call left `pending` (no matching `ToolCallEnd`, e.g. a
    /// stream cut short by cancellation) is finalized as-is rather than dropped.
    pub fn finalize(mut self) -> LlmResponse {
        for id in self.order {
            if let Some(call) = self.pending.remove(&id) {
                self.finished.push(call);
            }
        }

        let tool_calls = self
            .finished
            .into_iter()
            .map(|call| {
                if call.arguments.is_empty() {
                    return call;
                }
                if serde_json::from_str::<serde_json::Value>(&call.arguments).is_err() {
                    self.warnings.push(format!(
                        "tool call '{}' ({}) had invalid JSON arguments; defaulting to {{}}",
                        call.name, call.id
                    ));
                }
                call
            })
            .collect();

        LlmResponse {
            text: self.text,
            thinking: self.thinking,
            tool_calls,
            stop_reason: self.stop_reason,
            usage: self.usage,
            warnings: self.warnings,
        }
    }
}

fn finish_reason_str(reason: &FinishReason) -> String {
    match reason {
        FinishReason::Stop => "stop".to_string(),
        FinishReason::ToolCalls => "tool_calls".to_string(),
        FinishReason::Length => "length".to_string(),
        FinishReason::ContentFilter => "content_filter".to_string(),
        FinishReason::Other(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_text_deltas() {
        let mut acc = StreamAccumulator::new();
        acc.process(StreamEvent::TextDelta { text: "Hello, ".into() });
        acc.process(StreamEvent::TextDelta { text: "world".into() });
        let resp = acc.finalize();
        assert_eq!(resp.text, "Hello, world");
    }

    #[test]
    fn assembles_tool_call_args_across_deltas() {
        let mut acc = StreamAccumulator::new();
        acc.process(StreamEvent::ToolCallStart { id: "1".into(), name: "bash".into() });
        acc.process(StreamEvent::ToolCallDelta { id: "1".into(), args_delta: "{\"cmd\":".into() });
        acc.process(StreamEvent::ToolCallDelta { id: "1".into(), args_delta: "\"ls\"}".into() });
        acc.process(StreamEvent::ToolCallEnd { id: "1".into() });
        let resp = acc.finalize();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].parse_arguments(), serde_json::json!({"cmd": "ls"}));
        assert!(resp.warnings.is_empty());
    }

    #[test]
    fn invalid_json_args_produce_warning() {
        let mut acc = StreamAccumulator::new();
        acc.process(StreamEvent::ToolCallStart { id: "1".into(), name: "bash".into() });
        acc.process(StreamEvent::ToolCallDelta { id: "1".into(), args_delta: "not json".into() });
        acc.process(StreamEvent::ToolCallEnd { id: "1".into() });
        let resp = acc.finalize();
        assert_eq!(resp.tool_calls[0].parse_arguments(), serde_json::json!({}));
        assert_eq!(resp.warnings.len(), 1);
    }

    #[test]
    fn unmatched_tool_call_end_is_ignored() {
        let mut acc = StreamAccumulator::new();
        acc.process(StreamEvent::ToolCallEnd { id: "missing".into() });
        let resp = acc.finalize();
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn unterminated_tool_call_is_still_finalized() {
        let mut acc = StreamAccumulator::new();
        acc.process(StreamEvent::ToolCallStart { id: "1".into(), name: "bash".into() });
        acc.process(StreamEvent::ToolCallDelta { id: "1".into(), args_delta: "{}".into() });
        let resp = acc.finalize();
        assert_eq!(resp.tool_calls.len(), 1);
    }

    #[test]
    fn usage_accumulates_across_steps() {
        let mut acc = StreamAccumulator::new();
        acc.process(StreamEvent::StepFinish {
            reason: FinishReason::ToolCalls,
            usage: Usage { input_tokens: 10, output_tokens: 5, total_tokens: 15, ..Default::default() },
        });
        acc.process(StreamEvent::Finish {
            reason: FinishReason::Stop,
            usage: Usage { input_tokens: 2, output_tokens: 3, total_tokens: 5, ..Default::default() },
        });
        let resp = acc.finalize();
        assert_eq!(resp.usage.input_tokens, 12);
        assert_eq!(resp.usage.output_tokens, 8);
        assert_eq!(resp.stop_reason.as_deref(), Some("stop"));
    }
}
