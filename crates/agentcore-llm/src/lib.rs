//! Agentcore LLM - provider-agnostic streaming substrate for chat-completion APIs.

pub mod accumulator;
pub mod client;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod sse;
pub mod types;

pub use accumulator::StreamAccumulator;
pub use client::Client;
pub use provider::{LlmError, LlmResult, LlmStream, ProviderAdapter};
pub use providers::{AnthropicAdapter, OpenAiCompatAdapter};
pub use retry::RetryPolicy;
pub use types::*;
