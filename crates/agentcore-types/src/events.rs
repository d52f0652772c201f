//! Streaming event grammars.
//!
//! `StreamEvent` is what a `ProviderAdapter` emits, normalised across wire protocols.
//! `SessionEvent` is what a `Session` emits to its observer; the mapping between the two
//! is a pure function kept separate from the accumulator (see `agentcore-engine::loop_`).

use crate::types::Usage;
use serde::{Deserialize, Serialize};

/// Finish reason for one streaming step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other(String),
}

/// A normalised event from a provider's streaming response.
///
/// `StreamStart` is always first, `Finish` always last; every `ToolCallStart` pairs with
/// exactly one `ToolCallEnd`; delta events are monotone (append-only) per id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    StreamStart { id: String, model: String },
    TextDelta { text: String },
    ThinkingDelta { text: String },
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, args_delta: String },
    ToolCallEnd { id: String },
    StepFinish { reason: FinishReason, usage: Usage },
    Finish { reason: FinishReason, usage: Usage },
}

/// An event emitted on a `Session`'s outbound stream. Unknown tags must be treated as
/// ignorable by consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStart { session_id: String },
    SessionEnd { session_id: String },
    AssistantTextStart,
    AssistantTextDelta { text: String },
    AssistantTextEnd,
    ToolCallStart { id: String, name: String, args: serde_json::Value },
    ToolCallEnd { id: String, name: String, output: String, is_error: bool },
    ThinkingDelta { text: String },
    TurnLimit { reason: String },
    LoopDetection { message: String },
    ContextWarning { fraction: f64 },
    Error { message: String },
    SubagentEvent { subagent_id: String, event: Box<SessionEvent> },
}
