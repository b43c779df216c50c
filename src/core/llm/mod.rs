mod base;
pub mod openai;

pub use base::{DialogueLine, ReplyError, ReplyGenerator, Speaker};
pub use openai::{DEFAULT_OPENAI_BASE_URL, OpenAIConfig, OpenAIReplyGenerator};
