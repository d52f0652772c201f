//! Concrete `ProviderAdapter` implementations, one module per wire protocol.

pub mod anthropic;
pub mod openai_compat;

pub use anthropic::AnthropicAdapter;
pub use openai_compat::OpenAiCompatAdapter;

/// Parses a `Retry-After` response header into milliseconds. The header is either a delay in
/// seconds or an HTTP-date (RFC 7231); only the seconds form is honored here since every
/// provider this substrate talks to sends it that way in practice.
pub(crate) fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn parses_seconds_into_millis() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(parse_retry_after_ms(&headers), Some(30_000));
    }

    #[test]
    fn missing_header_is_none() {
        assert_eq!(parse_retry_after_ms(&HeaderMap::new()), None);
    }

    #[test]
    fn non_numeric_header_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(parse_retry_after_ms(&headers), None);
    }
}
