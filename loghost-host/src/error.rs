//! Host error types.

use loghost_protocol::{ProtocolError, Response};
use std::path::PathBuf;
use thiserror::Error;

/// Host errors.
#[derive(Debug, Error)]
pub enum HostError {
    /// The request tag matches no operation. The tag itself is kept for logs
    /// only; the wire message is fixed.
    #[error("unknown op")]
    UnknownOperation(Option<String>),

    #[error("invalid request: {0}")]
    InvalidRequest(ProtocolError),

    #[error("path not permitted: {}", .0.display())]
    PathNotPermitted(PathBuf),

    #[error("failed to {action} '{}': {source}", path.display())]
    Append {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl HostError {
    /// Builds an append failure for `path`.
    pub fn append(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostError::Append {
            action,
            path: path.into(),
            source,
        }
    }

    /// Converts the error into a failure response.
    pub fn to_response(&self) -> Response {
        Response::error(self.to_string())
    }
}
