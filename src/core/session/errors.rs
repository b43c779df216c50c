//! Error types for session operations

use crate::core::turn::ConversationState;

/// Errors returned to the client for requests the session cannot honor.
///
/// None of these end the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Reply ignored: session is {0}, expected processing")]
    NotProcessing(ConversationState),
    #[error("Reply text is empty")]
    EmptyReply,
    #[error("Session {0} is already registered")]
    DuplicateSession(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
