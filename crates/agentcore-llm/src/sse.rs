//! Generalized SSE line parsing, factored out so every provider adapter shares one
//! implementation instead of parsing its event stream inline.

use futures::{Stream, StreamExt};

/// One parsed Server-Sent Event record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Splits a raw byte stream on `\n\n` event boundaries, parsing `event:`/`data:`/`id:`
/// lines and ignoring `:`-prefixed comment lines. `data:` lines are concatenated with `\n`
/// per the SSE spec.
pub fn parse_sse<E>(
    bytes_stream: impl Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
) -> impl Stream<Item = Result<SseEvent, E>> + Send
where
    E: Send + 'static,
{
    async_stream::stream! {
        let mut buffer = String::new();
        tokio::pin!(bytes_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e);
                    continue;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(boundary) = buffer.find("\n\n") {
                let raw = buffer[..boundary].to_string();
                buffer = buffer[boundary + 2..].to_string();
                if let Some(event) = parse_one(&raw) {
                    yield Ok(event);
                }
            }
        }
    }
}

fn parse_one(raw: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut saw_field = false;

    for line in raw.lines() {
        if line.starts_with(':') || line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event.event = Some(rest.trim_start().to_string());
            saw_field = true;
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
            saw_field = true;
        } else if let Some(rest) = line.strip_prefix("id:") {
            event.id = Some(rest.trim_start().to_string());
            saw_field = true;
        }
    }

    if !saw_field {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}
