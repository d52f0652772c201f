//! Provider adapter interface and the HTTP status → error taxonomy.

use crate::types::{LlmRequest, LlmResponse};
use agentcore_types::StreamEvent;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

pub type LlmResult<T> = Result<T, LlmError>;

/// Errors surfaced by the streaming substrate. `retryable()` drives the retry wrapper in
/// `crate::retry`; only `RateLimit` and `Server` are ever retryable.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("context length exceeded: {0}")]
    ContextLength(String),

    #[error("rate limited: retry after {retry_after_ms:?}ms")]
    RateLimit { retry_after_ms: Option<u64> },

    #[error("server error: {0}")]
    Server(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("request timed out")]
    Timeout,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Maps an HTTP status code to a typed error, per the substrate's status→error table.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => LlmError::Authentication(body.to_string()),
            403 => LlmError::AccessDenied(body.to_string()),
            404 => LlmError::NotFound(body.to_string()),
            400 => {
                if body.to_lowercase().contains("context") || body.to_lowercase().contains("too long") {
                    LlmError::ContextLength(body.to_string())
                } else {
                    LlmError::InvalidRequest(body.to_string())
                }
            }
            429 => LlmError::RateLimit { retry_after_ms: None },
            500 | 502 | 503 => LlmError::Server(body.to_string()),
            _ => LlmError::Provider(format!("{}: {}", status, body)),
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, LlmError::RateLimit { .. } | LlmError::Server(_))
    }
}

pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// Wire-level adapter for one provider. Responsible for request/response/stream translation;
/// the substrate (client, retry, SSE parsing, error taxonomy) is responsible for everything
/// else.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Non-streaming completion. Default implementation drains `stream` and folds it with
    /// `StreamAccumulator`, which is correct for every adapter that only exposes a
    /// streaming wire endpoint (true of both adapters shipped here).
    async fn complete(&self, request: LlmRequest, cancel: CancellationToken) -> LlmResult<LlmResponse> {
        use futures::StreamExt;
        let stream = self.stream(request, cancel).await?;
        tokio::pin!(stream);
        let mut acc = crate::accumulator::StreamAccumulator::new();
        while let Some(event) = stream.next().await {
            acc.process(event?);
        }
        Ok(acc.finalize())
    }

    async fn stream(&self, request: LlmRequest, cancel: CancellationToken) -> LlmResult<LlmStream>;

    /// Optional teardown hook (closing idle connections, flushing metrics). Most adapters
    /// need nothing here.
    async fn close(&self) {}
}
