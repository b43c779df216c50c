//! # Synthesis boundary
//!
//! Text-to-speech is an external collaborator. The engine only needs one
//! operation from it: turn a chunk of text into decoded audio, giving up early
//! when the caller cancels. Streaming of a whole reply is built on top of this
//! by the [`ResponseStreamer`](super::streamer::ResponseStreamer).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Audio data structure for TTS output
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Audio bytes in the format specified by the provider
    pub data: Vec<u8>,
    /// Sample rate of the audio
    pub sample_rate: u32,
    /// Audio format (e.g., "linear16", "mulaw", "mp3")
    pub format: String,
    /// Duration of the audio in milliseconds, when it can be derived
    pub duration_ms: Option<u32>,
}

impl AudioData {
    /// Wrap raw provider bytes, deriving the duration for PCM-like formats.
    pub fn from_bytes(data: Vec<u8>, format: &str, sample_rate: u32) -> Self {
        let bytes_per_sample = match format {
            "linear16" | "pcm" => Some(2),
            "mulaw" | "ulaw" | "alaw" => Some(1),
            _ => None,
        };
        let duration_ms = bytes_per_sample.and_then(|bytes_per_sample| {
            if sample_rate == 0 {
                return None;
            }
            let samples = (data.len() / bytes_per_sample) as u64;
            Some((samples * 1000 / sample_rate as u64) as u32)
        });

        Self {
            data,
            sample_rate,
            format: format.to_string(),
            duration_ms,
        }
    }
}

/// TTS-specific error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum TTSError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Synthesis cancelled")]
    Cancelled,
}

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// Configuration for TTS providers
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TTSConfig {
    /// API key for the TTS provider
    pub api_key: String,
    /// Default voice used when the caller does not pick one
    pub voice_id: String,
    /// Audio encoding requested from the provider
    pub audio_format: String,
    /// Output sample rate
    pub sample_rate: u32,
    /// Request timeout in seconds
    pub request_timeout: u64,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: "aura-asteria-en".to_string(),
            audio_format: "linear16".to_string(),
            sample_rate: 24000,
            request_timeout: 30,
        }
    }
}

/// Boundary contract for a text-to-speech collaborator.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Synthesize one chunk of text.
    ///
    /// Implementations should check `cancel` while receiving audio and return
    /// [`TTSError::Cancelled`] as soon as it fires.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        cancel: &CancellationToken,
    ) -> TTSResult<AudioData>;

    /// Voice used when the session did not request one.
    fn default_voice(&self) -> &str;

    /// Short provider name for logs and telemetry.
    fn name(&self) -> &'static str;
}
