use tokio::sync::mpsc;

/// Result structure containing transcription data from STT providers
#[derive(Debug, Clone, PartialEq)]
pub struct STTResult {
    /// The transcribed text from the audio
    pub transcript: String,
    /// Whether this is a final transcription result (not an interim result)
    pub is_final: bool,
    /// Whether the provider believes the utterance ended here
    pub is_speech_final: bool,
    /// Confidence score of the transcription (0.0 to 1.0)
    pub confidence: f32,
}

impl STTResult {
    pub fn new(transcript: String, is_final: bool, is_speech_final: bool, confidence: f32) -> Self {
        Self {
            transcript,
            is_final,
            is_speech_final,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// An interim result, as produced mid-utterance.
    pub fn interim(transcript: impl Into<String>, confidence: f32) -> Self {
        Self::new(transcript.into(), false, false, confidence)
    }
}

/// Configuration for STT providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct STTConfig {
    /// API key for the STT provider
    pub api_key: String,
    /// Language code for transcription (e.g., "en-US", "es-ES")
    pub language: String,
    /// Sample rate of the audio in Hz
    pub sample_rate: u32,
    /// Number of audio channels (1 for mono, 2 for stereo)
    pub channels: u16,
    /// Enable punctuation in results
    pub punctuation: bool,
    /// Encoding of the audio
    pub encoding: String,
    /// Model to use for transcription
    pub model: String,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: "en-US".to_string(),
            sample_rate: 16000,
            channels: 1,
            punctuation: true,
            encoding: "linear16".to_string(),
            model: "nova-2".to_string(),
        }
    }
}

/// Error types for STT operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum STTError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Stream closed unexpectedly")]
    StreamClosed,
}

/// One open streaming connection to a transcription provider.
///
/// Audio slices go in through `audio`; results come out of `results`.
/// Dropping `audio` asks the provider to flush and close: it delivers any
/// remaining final results and then closes `results`. If `results` closes or
/// yields an error while `audio` is still held, the connection was lost.
pub struct TranscriptionStream {
    pub audio: mpsc::Sender<Vec<u8>>,
    pub results: mpsc::Receiver<Result<STTResult, STTError>>,
}

/// Boundary contract for a speech-to-text collaborator.
#[async_trait::async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Open a persistent streaming connection.
    async fn open_stream(&self) -> Result<TranscriptionStream, STTError>;

    /// Transcribe a complete utterance in one request.
    ///
    /// Used as the fallback when the streaming connection fails.
    async fn transcribe_once(&self, audio: &[u8]) -> Result<STTResult, STTError>;

    /// Short provider name for logs and telemetry.
    fn name(&self) -> &'static str;
}
