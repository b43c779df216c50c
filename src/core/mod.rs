pub mod llm;
pub mod session;
pub mod stt;
pub mod telemetry;
pub mod tts;
pub mod turn;
pub mod vad;

// Re-export commonly used types for convenience
pub use llm::{DialogueLine, OpenAIConfig, OpenAIReplyGenerator, ReplyError, ReplyGenerator};
pub use session::{
    Session, SessionConfig, SessionError, SessionEvent, SessionInfo, SessionRegistry,
    SessionServices,
};
pub use stt::{
    DeepgramSTT, DeepgramSTTConfig, STTConfig, STTError, STTResult, TranscriptCoordinator,
    TranscriptionProvider,
};
pub use telemetry::{TelemetryConfig, TelemetrySink, TelemetrySummary};
pub use tts::{AudioData, DeepgramTTS, ResponseStreamer, SynthesisProvider, TTSConfig, TTSError};
pub use turn::ConversationState;
pub use vad::{ClassifierConfig, SpeechEvent, VoiceActivityClassifier};
