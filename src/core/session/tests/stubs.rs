//! Stub collaborators for session tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::llm::{DialogueLine, ReplyError, ReplyGenerator};
use crate::core::stt::{STTError, STTResult, TranscriptionProvider, TranscriptionStream};
use crate::core::tts::{AudioData, SynthesisProvider, TTSResult};

/// Transcriber that answers each opened stream with the next scripted text,
/// committed when the audio side is closed.
#[derive(Default)]
pub struct ScriptedTranscriber {
    transcripts: Mutex<VecDeque<String>>,
    /// Interim result sent after the first slice of every stream.
    pub interim: Option<(String, f32)>,
    /// Mark the interim result as the provider's end of utterance.
    pub interim_speech_final: bool,
    pub fail_open: bool,
    pub fail_fallback: bool,
    pub streams_opened: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new<I, S>(transcripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transcripts: Mutex::new(transcripts.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn with_interim(mut self, text: &str, confidence: f32) -> Self {
        self.interim = Some((text.to_string(), confidence));
        self
    }
}

#[async_trait]
impl TranscriptionProvider for ScriptedTranscriber {
    async fn open_stream(&self) -> Result<TranscriptionStream, STTError> {
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(STTError::ConnectionFailed("refused".to_string()));
        }

        let text = self.transcripts.lock().pop_front().unwrap_or_default();
        let interim = self.interim.clone();
        let speech_final = self.interim_speech_final;
        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(64);
        let (result_tx, result_rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut first = true;
            while audio_rx.recv().await.is_some() {
                if std::mem::take(&mut first)
                    && let Some((interim_text, confidence)) = &interim
                {
                    let result =
                        STTResult::new(interim_text.clone(), false, speech_final, *confidence);
                    let _ = result_tx.send(Ok(result)).await;
                }
            }
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
        if self.fail_fallback {
            return Err(STTError::NetworkError("unreachable".to_string()));
        }
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
        _cancel: &CancellationToken,
    ) -> TTSResult<AudioData> {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
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

/// Generator returning a fixed reply, recording what it was asked.
pub struct CannedGenerator {
    reply: Result<String, ReplyError>,
    delay: Duration,
    pub requests: Mutex<Vec<(String, Vec<DialogueLine>)>>,
}

impl CannedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ReplyError) -> Self {
        Self {
            reply: Err(error),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ReplyGenerator for CannedGenerator {
    async fn generate(
        &self,
        transcript: &str,
        history: &[DialogueLine],
    ) -> Result<String, ReplyError> {
        self.requests
            .lock()
            .push((transcript.to_string(), history.to_vec()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone()
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}
