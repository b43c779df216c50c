//! Stub collaborators and a WebSocket client for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tokio_util::sync::CancellationToken;

use parley::core::llm::{DialogueLine, ReplyError, ReplyGenerator};
use parley::core::stt::{STTError, STTResult, TranscriptionProvider, TranscriptionStream};
use parley::core::tts::{AudioData, SynthesisProvider, TTSError, TTSResult};
use parley::{ServerConfig, routes, state::AppState};

/// Transcriber committing the next scripted text when the utterance closes.
#[derive(Default)]
pub struct ScriptedTranscriber {
    transcripts: Mutex<VecDeque<String>>,
}

impl ScriptedTranscriber {
    pub fn new(transcripts: &[&str]) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.iter().map(|t| t.to_string()).collect()),
        }
    }
}

#[async_trait]
impl TranscriptionProvider for ScriptedTranscriber {
    async fn open_stream(&self) -> Result<TranscriptionStream, STTError> {
        let text = self.transcripts.lock().pop_front().unwrap_or_default();
        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(64);
        let (result_tx, result_rx) = mpsc::channel(16);

        tokio::spawn(async move {
            while audio_rx.recv().await.is_some() {}
            if !text.is_empty() {
                let _ = result_tx.send(Ok(STTResult::new(text, true, false, 0.95))).await;
            }
        });

        Ok(TranscriptionStream {
            audio: audio_tx,
            results: result_rx,
        })
    }

    async fn transcribe_once(&self, _audio: &[u8]) -> Result<STTResult, STTError> {
        let text = self.transcripts.lock().pop_front().unwrap_or_default();
        Ok(STTResult::new(text, true, true, 0.8))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Synthesizer that needs one permit per chunk.
pub struct GatedSynth {
    pub permits: Arc<Semaphore>,
}

impl GatedSynth {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(permits)),
        }
    }
}

#[async_trait]
impl SynthesisProvider for GatedSynth {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &str,
        cancel: &CancellationToken,
    ) -> TTSResult<AudioData> {
        tokio::select! {
            permit = self.permits.acquire() => {
                if let Ok(permit) = permit {
                    permit.forget();
                }
            }
            _ = cancel.cancelled() => return Err(TTSError::Cancelled),
        }
        Ok(AudioData::from_bytes(vec![0u8; 480 * text.len().max(1)], "linear16", 24000))
    }

    fn default_voice(&self) -> &str {
        "stub-voice"
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

pub struct CannedGenerator {
    reply: String,
}

impl CannedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for CannedGenerator {
    async fn generate(
        &self,
        _transcript: &str,
        _history: &[DialogueLine],
    ) -> Result<String, ReplyError> {
        Ok(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

/// 100ms of 16kHz PCM16 well above the default energy threshold.
pub fn loud_chunk() -> Vec<u8> {
    (0..1600)
        .flat_map(|i| {
            let sample: i16 = if i % 2 == 0 { 8000 } else { -8000 };
            sample.to_le_bytes()
        })
        .collect()
}

pub fn silent_chunk() -> Vec<u8> {
    vec![0u8; 3200]
}

pub fn test_state(
    transcripts: &[&str],
    synth: Arc<GatedSynth>,
    generator: Option<Arc<dyn ReplyGenerator>>,
) -> Arc<AppState> {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };
    AppState::with_collaborators(
        config,
        Arc::new(ScriptedTranscriber::new(transcripts)),
        synth,
        generator,
    )
}

/// Serve the application on an OS-assigned port.
pub async fn spawn_server(app_state: Arc<AppState>) -> SocketAddr {
    let app = routes::create_app(app_state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub session_id: String,
    /// Every JSON message received so far, in order.
    pub seen: Vec<Value>,
}

impl Client {
    /// Connect and consume the `connected` greeting.
    pub async fn connect(addr: SocketAddr) -> Self {
        let url = format!("ws://{addr}/ws");
        let (ws, _) = connect_async(url).await.expect("Failed to connect");
        let mut client = Self {
            ws,
            session_id: String::new(),
            seen: Vec::new(),
        };
        let greeting = client.wait_for("connected").await;
        client.session_id = greeting["session_id"].as_str().unwrap().to_string();
        client
    }

    pub async fn send_audio(&mut self, chunk: &[u8]) {
        self.ws
            .send(Message::Binary(chunk.to_vec().into()))
            .await
            .unwrap();
    }

    pub async fn send_audio_n(&mut self, chunk: &[u8], count: usize) {
        for _ in 0..count {
            self.send_audio(chunk).await;
        }
    }

    pub async fn speak_utterance(&mut self) {
        self.send_audio_n(&loud_chunk(), 10).await;
        self.send_audio_n(&silent_chunk(), 5).await;
    }

    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    /// Next JSON message, or `None` if nothing arrives within `window`.
    pub async fn next_within(&mut self, window: Duration) -> Option<Value> {
        loop {
            let frame = tokio::time::timeout(window, self.ws.next()).await.ok()??;
            if let Message::Text(text) = frame.unwrap() {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                self.seen.push(value.clone());
                return Some(value);
            }
        }
    }

    /// Read until a message of `kind` arrives, panicking after two seconds.
    pub async fn wait_for(&mut self, kind: &str) -> Value {
        loop {
            let message = self
                .next_within(Duration::from_secs(2))
                .await
                .unwrap_or_else(|| panic!("no '{kind}' message; seen {:?}", self.types()));
            if message["type"] == kind {
                return message;
            }
        }
    }

    /// Read until a `state_changed` into `state` arrives.
    pub async fn wait_for_state(&mut self, state: &str) -> Value {
        loop {
            let message = self.wait_for("state_changed").await;
            if message["to"] == state {
                return message;
            }
        }
    }

    /// Collect messages until `window` passes without one.
    pub async fn drain(&mut self, window: Duration) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(message) = self.next_within(window).await {
            out.push(message);
        }
        out
    }

    pub fn types(&self) -> Vec<String> {
        self.seen
            .iter()
            .map(|m| m["type"].as_str().unwrap_or("?").to_string())
            .collect()
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
