//! Remote store error types
//!
//! Transport and protocol failures are surfaced unchanged; nothing here is
//! retried.

use thiserror::Error;

/// Errors raised by a remote store or its tuple stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Collection does not exist on the remote
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Remote refused the request
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Connection or I/O failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Tuple stream is malformed or reported an exception
    #[error("malformed tuple stream: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::CollectionNotFound(_) => "BRIDGE_REMOTE_COLLECTION_NOT_FOUND",
            RemoteError::Rejected(_) => "BRIDGE_REMOTE_REJECTED",
            RemoteError::Transport(_) => "BRIDGE_REMOTE_TRANSPORT",
            RemoteError::Protocol(_) => "BRIDGE_REMOTE_PROTOCOL",
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}
