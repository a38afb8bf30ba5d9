//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while framing or interpreting messages.
///
/// Every variant produced on the read path means the stream can no longer be
/// trusted; the host treats them all as the end of the conversation.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("truncated length prefix: stream closed after {read} of 4 bytes")]
    TruncatedPrefix { read: usize },

    #[error("truncated payload: expected {expected} bytes, stream closed after {actual}")]
    TruncatedPayload { expected: u32, actual: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u32 },

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}
