//! Session-level error taxonomy.
//!
//! Distinguishes fatal-to-session errors (which close a `Session` and surface as a
//! terminal `Error` SessionEvent) from conditions the loop handles in-band. Tool and
//! provider errors are converted at their crate boundary via `#[from]`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("session closed")]
    SessionClosed,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("context length exceeded: {0}")]
    ContextLength(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("subagent depth exceeded: max depth {0}")]
    SubagentDepthExceeded(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error should transition a Session to Closed (fatal-to-session) rather
    /// than being handled in-band by the loop.
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, Error::SessionNotFound(_) | Error::SubagentDepthExceeded(_))
    }
}
