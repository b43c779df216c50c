use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from the reply-generation collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReplyError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Reply generation timed out")]
    Timeout,
    #[error("Provider returned an empty reply")]
    EmptyReply,
}

/// Who said a line of dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One line of the in-session dialogue history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: Speaker,
    pub text: String,
}

impl DialogueLine {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// Boundary contract for the reply-generation collaborator.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce a reply to `transcript`, given the earlier lines of this session.
    async fn generate(&self, transcript: &str, history: &[DialogueLine])
    -> Result<String, ReplyError>;

    fn name(&self) -> &'static str;
}
