//! Retry wrapper with jittered exponential backoff.
//!
//! Only wraps `complete()`-style calls where the whole request can be safely resent;
//! never wraps a stream once its first byte has arrived.

use crate::provider::{LlmError, LlmResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (0-indexed, so `attempt == 0` is the first retry),
    /// honoring a server-supplied `Retry-After` when present, capped to `max_delay_ms`
    /// either way, plus uniform jitter in `[0, 0.25 * delay]`.
    fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        let base = retry_after_ms.unwrap_or_else(|| {
            let scaled = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
            scaled.min(self.max_delay_ms as f64) as u64
        });
        let base = base.min(self.max_delay_ms);
        let jitter_max = (base as f64 * 0.25) as u64;
        let jitter = if jitter_max == 0 { 0 } else { rand::thread_rng().gen_range(0..=jitter_max) };
        Duration::from_millis(base + jitter)
    }
}

/// Retries `op` up to `policy.max_attempts` times when the error is `retryable()`. A
/// `Retry-After` that exceeds `max_delay_ms` is not honored with a capped wait — per §4.8 the
/// error surfaces immediately instead, since waiting past the configured ceiling defeats the
/// point of having one.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> LlmResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LlmResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.retryable() && attempt + 1 < policy.max_attempts => {
                let retry_after_ms = match &err {
                    LlmError::RateLimit { retry_after_ms } => *retry_after_ms,
                    _ => None,
                };
                if let Some(ms) = retry_after_ms {
                    if ms > policy.max_delay_ms {
                        tracing::debug!(retry_after_ms = ms, max_delay_ms = policy.max_delay_ms, "retry-after exceeds max delay, surfacing error");
                        return Err(err);
                    }
                }
                let delay = policy.delay_for(attempt, retry_after_ms);
                tracing::debug!(attempt, ?delay, "retrying after retryable llm error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
