//! WebSocket error types and handling
//!
//! Errors here are reported to the client as `error` messages; none of them
//! close the connection.

use thiserror::Error;

use crate::core::session::SessionError;

/// WebSocket handler error types
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// The session refused the request
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl WebSocketError {
    /// Convert error to outgoing message format
    pub fn to_message(&self) -> String {
        self.to_string()
    }
}

/// Result type for WebSocket operations
pub type WebSocketResult<T> = Result<T, WebSocketError>;
