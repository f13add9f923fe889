// crates/relay-lib/src/error.rs

//! Central error type for the relay core.
use relay_common::ServerEvent;
use thiserror::Error;

/// Relay error taxonomy. Validation errors are reported only to the
/// originating connection as an `error` event, never broadcast.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("missing room or user")]
    InvalidJoinRequest,

    #[error("invalid session")]
    InvalidSession,

    #[error("empty message")]
    EmptyMessage,

    #[error("connection closed")]
    TransportFailure,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable error code for the wire `error` event
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidJoinRequest => "INVALID_JOIN",
            RelayError::InvalidSession => "INVALID_SESSION",
            RelayError::EmptyMessage => "EMPTY_MESSAGE",
            RelayError::TransportFailure => "TRANSPORT",
            RelayError::Io(_) => "IO",
            RelayError::Json(_) => "JSON",
            RelayError::Internal(_) => "INTERNAL",
        }
    }

    /// Errors that are dropped without telling the client. An empty
    /// message is what a human pressing enter on blank input produces.
    pub fn is_silent(&self) -> bool {
        matches!(self, RelayError::EmptyMessage)
    }

    /// Render as the wire `error` event for the offending connection.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RelayError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RelayError::Internal("Failed to send message".to_string())
    }
}
