//! Provider-name-keyed client: resolves a `LlmRequest.provider` to its adapter and applies
//! the retry policy around non-streaming completions.

use crate::provider::{LlmError, LlmResult, LlmStream, ProviderAdapter};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{LlmRequest, LlmResponse};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Client {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    default_provider: Option<String>,
    retry_policy: RetryPolicy,
}

impl Client {
    pub fn new() -> Self {
        Self { adapters: HashMap::new(), default_provider: None, retry_policy: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Registers an adapter. The first adapter registered becomes the default provider.
    pub fn register(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let name = adapter.name().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.adapters.insert(name, adapter);
        self
    }

    fn resolve(&self, provider: &str) -> LlmResult<&Arc<dyn ProviderAdapter>> {
        let key = if provider.is_empty() {
            self.default_provider.as_deref().ok_or_else(|| {
                LlmError::Configuration("no default provider configured".to_string())
            })?
        } else {
            provider
        };
        self.adapters
            .get(key)
            .ok_or_else(|| LlmError::Configuration(format!("unknown provider: {key}")))
    }

    /// Non-streaming completion, retried per `retry_policy` on retryable errors. Safe to
    /// retry wholesale since nothing has been observed by the caller yet.
    pub async fn complete(&self, request: LlmRequest, cancel: CancellationToken) -> LlmResult<LlmResponse> {
        let adapter = self.resolve(&request.provider)?.clone();
        with_retry(&self.retry_policy, || {
            let adapter = adapter.clone();
            let request = request.clone();
            let cancel = cancel.clone();
            async move { adapter.complete(request, cancel).await }
        })
        .await
    }

    /// Streaming completion. Not retried: once the first event has been yielded to the
    /// caller, silently resending the request would duplicate observed output.
    pub async fn stream(&self, request: LlmRequest, cancel: CancellationToken) -> LlmResult<LlmStream> {
        let adapter = self.resolve(&request.provider)?.clone();
        adapter.stream(request, cancel).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
