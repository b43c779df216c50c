mod base;
pub mod chunker;
pub mod deepgram;
pub mod streamer;

use std::sync::Arc;

pub use base::{AudioData, SynthesisProvider, TTSConfig, TTSError, TTSResult};
pub use chunker::{DEFAULT_MAX_CHUNK_CHARS, split_reply};
pub use deepgram::{DEEPGRAM_SPEAK_URL, DeepgramTTS};
pub use streamer::{
    ResponseChunk, ResponseHandle, ResponseSink, ResponseStream, ResponseStreamer, StreamOutcome,
    StreamStatus,
};

/// Factory function to create a synthesis provider.
///
/// # Supported Providers
///
/// - `"deepgram"` - Deepgram speak REST API
pub fn create_synthesis_provider(
    provider_type: &str,
    config: TTSConfig,
) -> TTSResult<Arc<dyn SynthesisProvider>> {
    match provider_type.to_lowercase().as_str() {
        "deepgram" => Ok(Arc::new(DeepgramTTS::new(config)?)),
        _ => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {provider_type}. Supported providers: deepgram"
        ))),
    }
}
