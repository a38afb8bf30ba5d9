//! Client error types.

use std::path::PathBuf;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] loghost_protocol::ProtocolError),

    #[error("failed to start host '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("host closed its output before answering")]
    HostClosed,

    #[error("host input already closed")]
    InputClosed,

    #[error("host error: {0}")]
    HostError(String),
}
