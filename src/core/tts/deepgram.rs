//! # Deepgram TTS
//!
//! Request/response synthesis against Deepgram's `/v1/speak` REST endpoint.
//! The body is read as a byte stream so that a cancelled chunk stops
//! downloading as soon as the token fires.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use super::base::{AudioData, SynthesisProvider, TTSConfig, TTSError, TTSResult};

pub const DEEPGRAM_SPEAK_URL: &str = "https://api.deepgram.com/v1/speak";

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Deepgram speak client.
pub struct DeepgramTTS {
    config: TTSConfig,
    base_url: String,
    client: reqwest::Client,
}

impl DeepgramTTS {
    pub fn new(config: TTSConfig) -> TTSResult<Self> {
        Self::with_base_url(config, DEEPGRAM_SPEAK_URL)
    }

    pub fn with_base_url(config: TTSConfig, base_url: &str) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Deepgram API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout.max(1)))
            .build()
            .map_err(|e| TTSError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            base_url: base_url.to_string(),
            client,
        })
    }

    /// Build the speak URL with model and encoding parameters.
    pub fn build_speak_url(&self, voice: &str) -> TTSResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TTSError::InvalidConfiguration(format!("Invalid URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("model", voice);
            query.append_pair("encoding", &self.config.audio_format);
            if matches!(self.config.audio_format.as_str(), "linear16" | "mulaw" | "alaw") {
                query.append_pair("sample_rate", &self.config.sample_rate.to_string());
                query.append_pair("container", "none");
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl SynthesisProvider for DeepgramTTS {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        cancel: &CancellationToken,
    ) -> TTSResult<AudioData> {
        if cancel.is_cancelled() {
            return Err(TTSError::Cancelled);
        }

        let voice = if voice.is_empty() {
            self.config.voice_id.as_str()
        } else {
            voice
        };
        let url = self.build_speak_url(voice)?;

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&SpeakRequest { text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TTSError::TimeoutError(e.to_string())
                } else {
                    TTSError::NetworkError(format!("Request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("TTS API error ({}): {}", status, error_body);
            return Err(TTSError::ProviderError(format!(
                "API error ({status}): {error_body}"
            )));
        }

        let mut audio = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            if cancel.is_cancelled() {
                debug!("Synthesis cancelled after {} bytes", audio.len());
                return Err(TTSError::Cancelled);
            }
            let bytes = item.map_err(|e| {
                TTSError::AudioGenerationFailed(format!("Failed to read audio: {e}"))
            })?;
            audio.extend_from_slice(&bytes);
        }

        if cancel.is_cancelled() {
            return Err(TTSError::Cancelled);
        }

        debug!("Synthesized {} bytes for {} chars", audio.len(), text.len());
        Ok(AudioData::from_bytes(
            audio,
            &self.config.audio_format,
            self.config.sample_rate,
        ))
    }

    fn default_voice(&self) -> &str {
        &self.config.voice_id
    }

    fn name(&self) -> &'static str {
        "deepgram"
    }
}
