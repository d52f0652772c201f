//! Core data model: content parts, turns, and their associated value types.
//!
//! Tagged unions throughout — `ContentPart` and `Turn` are Rust enums, not a class
//! hierarchy. See `events` for the `StreamEvent`/`SessionEvent` sum types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// One piece of message content. Exactly one of `data`/`url` is set on `Image`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        #[serde(skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        media_type: String,
    },
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },
    ToolResult {
        id: String,
        content: String,
        is_error: bool,
    },
    Thinking {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    RedactedThinking {
        data: String,
    },
    Audio {
        base64: String,
        media_type: String,
    },
    Document {
        base64: String,
        media_type: String,
    },
}

impl ContentPart {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One appended, immutable record in a session's history.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Assistant { content: Vec<ContentPart> },
    ToolResults { entries: Vec<ToolCallResult> },
    System { text: String },
    Steering { text: String },
}

impl Turn {
    /// Approximate character length of this turn's content, for context tracking.
    pub fn char_len(&self) -> usize {
        match self {
            Turn::User { text } | Turn::System { text } | Turn::Steering { text } => text.len(),
            Turn::Assistant { content } => content
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.len(),
                    ContentPart::Thinking { text, .. } => text.len(),
                    ContentPart::ToolCall { name, args, .. } => name.len() + args.to_string().len(),
                    _ => 0,
                })
                .sum(),
            Turn::ToolResults { entries } => entries.iter().map(|e| e.output.len()).sum(),
        }
    }
}

/// A tool call the assistant has requested, built from an assembled assistant turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// The result of executing one `PendingToolCall`. `id` matches the pending call's id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn ok(id: impl Into<String>, output: impl Into<String>) -> Self {
        Self { id: id.into(), output: output.into(), is_error: false }
    }

    pub fn error(id: impl Into<String>, output: impl Into<String>) -> Self {
        Self { id: id.into(), output: output.into(), is_error: true }
    }
}

/// Aggregated token usage across one or more streaming steps.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub reasoning_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
    }
}

/// Session lifecycle state. Transitions only as described by `Session`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Processing,
    AwaitingInput,
    Closed,
}

/// Reasoning effort hint forwarded to providers that support it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// Stage-1 clamp strategy for a truncated tool result. See `agentcore-engine::truncation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationMode {
    /// Keep the first and last halves, dropping the middle.
    HeadTail,
    /// Keep only the tail.
    Tail,
}

/// Per-tool truncation limits: a character clamp (always) and an optional line clamp.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ToolLimits {
    pub char_limit: usize,
    pub mode: TruncationMode,
    pub line_limit: Option<usize>,
}

/// Truncation config keyed by tool name. See `agentcore-engine::truncation::default_limits`.
pub type ToolLimitsTable = HashMap<String, ToolLimits>;
