use std::time::Duration;

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Link-level failure; the connection is no longer usable
    #[error("I/O error: {0}")]
    Io(String),

    /// No frame terminator arrived within the window
    #[error("Timed out after {0:?} waiting for a frame terminator")]
    Timeout(Duration),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Reply did not echo the command/target of the pending request
    #[error("Unexpected reply: expected echo {expected}, received {received}")]
    UnexpectedReply { expected: String, received: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Device busy: {0}")]
    Busy(String),

    #[error("Device is not connected")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl DomainError {
    /// Fatal errors invalidate the current connection
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Wire-level failures that may succeed when the operation is re-issued
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::MalformedFrame(_) | Self::UnexpectedReply { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
