use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{STTConfig, STTError, STTResult, TranscriptionProvider, TranscriptionStream};

const DEEPGRAM_LISTEN_WS: &str = "wss://api.deepgram.com/v1/listen";
const DEEPGRAM_LISTEN_HTTP: &str = "https://api.deepgram.com/v1/listen";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 64;

/// Configuration specific to Deepgram STT
#[derive(Debug, Clone)]
pub struct DeepgramSTTConfig {
    /// Base STT configuration
    pub base: STTConfig,
    /// Enable interim results
    pub interim_results: bool,
    /// Enable smart formatting
    pub smart_format: bool,
    /// Endpointing silence in milliseconds; drives `speech_final`
    pub endpointing: Option<u32>,
    /// Streaming endpoint
    pub streaming_url: String,
    /// Pre-recorded endpoint used for single-shot fallback
    pub prerecorded_url: String,
}

impl Default for DeepgramSTTConfig {
    fn default() -> Self {
        Self {
            base: STTConfig::default(),
            interim_results: true,
            smart_format: true,
            endpointing: Some(300),
            streaming_url: DEEPGRAM_LISTEN_WS.to_string(),
            prerecorded_url: DEEPGRAM_LISTEN_HTTP.to_string(),
        }
    }
}

/// Deepgram streaming response structure
#[derive(Debug, Deserialize, Serialize)]
pub struct DeepgramResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub channel: Option<DeepgramChannel>,
    pub is_final: Option<bool>,
    pub speech_final: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DeepgramChannel {
    pub alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DeepgramAlternative {
    pub transcript: String,
    pub confidence: f32,
}

/// Deepgram error response structure
#[derive(Debug, Deserialize, Serialize)]
pub struct DeepgramError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub description: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct PrerecordedResponse {
    results: PrerecordedResults,
}

#[derive(Debug, Deserialize)]
struct PrerecordedResults {
    channels: Vec<DeepgramChannel>,
}

/// Build a listen URL with the query parameters shared by both endpoints.
fn build_listen_url(
    base_url: &str,
    config: &DeepgramSTTConfig,
    streaming: bool,
) -> Result<String, STTError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| STTError::ConfigurationError(format!("Invalid Deepgram URL: {e}")))?;

    {
        let mut query_pairs = url.query_pairs_mut();
        query_pairs.append_pair("model", &config.base.model);
        query_pairs.append_pair("language", &config.base.language);
        query_pairs.append_pair("encoding", &config.base.encoding);
        query_pairs.append_pair("sample_rate", &config.base.sample_rate.to_string());
        query_pairs.append_pair("channels", &config.base.channels.to_string());
        query_pairs.append_pair("punctuate", &config.base.punctuation.to_string());
        query_pairs.append_pair("smart_format", &config.smart_format.to_string());

        if streaming {
            query_pairs.append_pair("interim_results", &config.interim_results.to_string());
            if let Some(endpointing) = config.endpointing {
                query_pairs.append_pair("endpointing", &endpointing.to_string());
            }
        }
    }

    Ok(url.to_string())
}

/// Parse one streaming text frame.
///
/// Returns `Ok(None)` for frames that carry no transcript (metadata,
/// utterance-end markers without text, unknown types).
pub fn parse_streaming_message(text: &str) -> Result<Option<STTResult>, STTError> {
    let response: DeepgramResponse = serde_json::from_str(text)
        .map_err(|e| STTError::ProviderError(format!("Failed to parse response: {e}")))?;

    match response.response_type.as_str() {
        "Results" => Ok(response
            .channel
            .and_then(|channel| channel.alternatives.into_iter().next())
            .map(|alternative| {
                STTResult::new(
                    alternative.transcript,
                    response.is_final.unwrap_or(false),
                    response.speech_final.unwrap_or(false),
                    alternative.confidence,
                )
            })),
        "Metadata" | "SpeechStarted" | "UtteranceEnd" => {
            debug!("Deepgram {} frame", response.response_type);
            Ok(None)
        }
        "Error" => {
            let error_msg = if let Ok(error) = serde_json::from_str::<DeepgramError>(text) {
                format!("{}: {}", error.error_type, error.description)
            } else {
                "Unknown error from Deepgram".to_string()
            };
            Err(STTError::ProviderError(error_msg))
        }
        other => {
            warn!("Unknown Deepgram response type: {}", other);
            Ok(None)
        }
    }
}

/// Deepgram live transcription with pre-recorded fallback.
pub struct DeepgramSTT {
    config: DeepgramSTTConfig,
    http: reqwest::Client,
}

impl DeepgramSTT {
    pub fn new(config: DeepgramSTTConfig) -> Result<Self, STTError> {
        if config.base.api_key.is_empty() {
            return Err(STTError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| STTError::ConfigurationError(format!("HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &DeepgramSTTConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl TranscriptionProvider for DeepgramSTT {
    async fn open_stream(&self) -> Result<TranscriptionStream, STTError> {
        let ws_url = build_listen_url(&self.config.streaming_url, &self.config, true)?;

        let mut request = ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| STTError::ConfigurationError(format!("Invalid request: {e}")))?;
        let auth = HeaderValue::from_str(&format!("token {}", self.config.base.api_key))
            .map_err(|e| STTError::ConfigurationError(format!("Invalid API key: {e}")))?;
        request.headers_mut().insert("Authorization", auth);

        let (ws_stream, _) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| STTError::ConnectionFailed("Connection timeout".to_string()))?
            .map_err(|e| STTError::ConnectionFailed(format!("Failed to connect: {e}")))?;

        info!("Connected to Deepgram WebSocket");

        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let (mut ws_sink, mut ws_stream) = ws_stream.split();
            let mut closing = false;

            loop {
                tokio::select! {
                    audio = audio_rx.recv(), if !closing => match audio {
                        Some(bytes) => {
                            if let Err(e) = ws_sink.send(Message::Binary(bytes.into())).await {
                                error!("Failed to send audio to Deepgram: {}", e);
                                let _ = result_tx
                                    .send(Err(STTError::NetworkError(e.to_string())))
                                    .await;
                                break;
                            }
                        }
                        None => {
                            closing = true;
                            let close = Message::Text(r#"{"type":"CloseStream"}"#.into());
                            if let Err(e) = ws_sink.send(close).await {
                                warn!("Failed to send CloseStream: {}", e);
                                break;
                            }
                        }
                    },
                    message = ws_stream.next() => match message {
                        Some(Ok(Message::Text(text))) => match parse_streaming_message(&text) {
                            Ok(Some(result)) => {
                                if result_tx.send(Ok(result)).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                let _ = result_tx.send(Err(e)).await;
                                break;
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            info!("Deepgram closed the stream: {:?}", frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Deepgram WebSocket error: {}", e);
                            let _ = result_tx
                                .send(Err(STTError::NetworkError(e.to_string())))
                                .await;
                            break;
                        }
                        None => break,
                    }
                }
            }

            let _ = ws_sink.close().await;
            debug!("Deepgram stream task finished");
        });

        Ok(TranscriptionStream {
            audio: audio_tx,
            results: result_rx,
        })
    }

    async fn transcribe_once(&self, audio: &[u8]) -> Result<STTResult, STTError> {
        let url = build_listen_url(&self.config.prerecorded_url, &self.config, false)?;

        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Token {}", self.config.base.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| STTError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(STTError::ProviderError(format!(
                "Deepgram returned {status}: {body}"
            )));
        }

        let parsed: PrerecordedResponse = response
            .json()
            .await
            .map_err(|e| STTError::ProviderError(format!("Failed to parse response: {e}")))?;

        let alternative = parsed
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|channel| channel.alternatives.into_iter().next())
            .ok_or_else(|| STTError::ProviderError("Empty transcription result".to_string()))?;

        Ok(STTResult::new(
            alternative.transcript,
            true,
            true,
            alternative.confidence,
        ))
    }

    fn name(&self) -> &'static str {
        "deepgram"
    }
}
