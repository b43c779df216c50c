//! Streaming transcript coordination.
//!
//! One [`TranscriptHandle`] lives for each LISTENING period. It owns a
//! background pump that opens the provider stream, forwards audio in fixed
//! time slices and turns provider results into [`TranscriptEvent`]s:
//!
//! ```text
//! feed(chunk) ──► pending slice ──(>= slice_ms)──► pump ──► provider stream
//!                                                     │
//!              events ◄── Partial / EarlyTrigger ◄────┘
//!
//! finalize() ──► close audio ──► wait for flush ──► text
//!                       └── stream failed? ──► transcribe_once(whole utterance)
//! ```
//!
//! Finalization is always driven by the caller (the session decides when the
//! utterance ended). A provider utterance-end result is surfaced only as
//! [`TranscriptEventKind::UtteranceEndHint`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::base::{STTError, STTResult, TranscriptionProvider, TranscriptionStream};

/// Tuning for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Audio accumulated before a slice is forwarded (ms). Default: 250.
    pub slice_ms: u64,
    /// Partial confidence that raises the early trigger. Default: 0.8.
    pub early_trigger_threshold: f32,
    /// Minimum accumulated characters before the early trigger may fire. Default: 10.
    pub min_early_trigger_chars: usize,
    /// PCM16 mono sample rate. Default: 16000.
    pub sample_rate: u32,
    /// How long finalize waits for the provider to flush. Default: 2s.
    pub flush_timeout: Duration,
    /// Slices that may queue up while the connection is being opened. Default: 64.
    pub slice_queue_depth: usize,
    /// Most recent utterance audio kept for the single-shot fallback (ms). Default: 30000.
    pub max_buffered_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            slice_ms: 250,
            early_trigger_threshold: 0.8,
            min_early_trigger_chars: 10,
            sample_rate: 16000,
            flush_timeout: Duration::from_secs(2),
            slice_queue_depth: 64,
            max_buffered_ms: 30_000,
        }
    }
}

impl CoordinatorConfig {
    fn slice_bytes(&self) -> usize {
        let samples = self.sample_rate as u64 * self.slice_ms / 1000;
        (samples as usize * 2).max(2)
    }

    fn max_buffered_bytes(&self) -> usize {
        let samples = self.sample_rate as u64 * self.max_buffered_ms / 1000;
        samples as usize * 2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEventKind {
    /// The accumulated transcript changed.
    Partial { text: String, confidence: f32 },
    /// First sufficiently confident partial of the utterance. Fires once.
    EarlyTrigger { text: String, confidence: f32 },
    /// The provider thinks the utterance ended.
    UtteranceEndHint,
    /// The streaming connection failed; finalize will use the single-shot call.
    DegradedMode { reason: String },
}

/// Event raised while an utterance is being transcribed.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub utterance_id: u64,
    pub kind: TranscriptEventKind,
}

/// Outcome of [`TranscriptHandle::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct FinalTranscript {
    pub text: String,
    pub confidence: f32,
    /// True when the text came from the single-shot fallback.
    pub degraded: bool,
    pub early_triggered: bool,
    pub audio_seconds: f64,
}

#[derive(Debug, Default)]
struct StreamProgress {
    committed: String,
    interim: String,
    last_confidence: f32,
    early_fired: bool,
    failed: bool,
    degraded_reported: bool,
}

impl StreamProgress {
    fn accumulated(&self) -> String {
        match (self.committed.is_empty(), self.interim.is_empty()) {
            (_, true) => self.committed.clone(),
            (true, false) => self.interim.clone(),
            (false, false) => format!("{} {}", self.committed, self.interim),
        }
    }
}

#[derive(Clone)]
struct StreamEmitter {
    utterance_id: u64,
    events: mpsc::UnboundedSender<TranscriptEvent>,
    progress: Arc<Mutex<StreamProgress>>,
    early_trigger_threshold: f32,
    min_early_trigger_chars: usize,
}

impl StreamEmitter {
    fn emit(&self, kind: TranscriptEventKind) {
        let _ = self.events.send(TranscriptEvent {
            utterance_id: self.utterance_id,
            kind,
        });
    }

    fn on_result(&self, result: STTResult) {
        let text = result.transcript.trim();
        let mut pending = Vec::with_capacity(3);

        {
            let mut progress = self.progress.lock();
            if result.is_final {
                if !text.is_empty() {
                    if !progress.committed.is_empty() {
                        progress.committed.push(' ');
                    }
                    progress.committed.push_str(text);
                }
                progress.interim.clear();
            } else {
                progress.interim = text.to_string();
            }

            if !text.is_empty() {
                progress.last_confidence = result.confidence;
                let accumulated = progress.accumulated();

                if !progress.early_fired
                    && result.confidence >= self.early_trigger_threshold
                    && accumulated.chars().count() >= self.min_early_trigger_chars
                {
                    progress.early_fired = true;
                    pending.push(TranscriptEventKind::Partial {
                        text: accumulated.clone(),
                        confidence: result.confidence,
                    });
                    pending.push(TranscriptEventKind::EarlyTrigger {
                        text: accumulated,
                        confidence: result.confidence,
                    });
                } else {
                    pending.push(TranscriptEventKind::Partial {
                        text: accumulated,
                        confidence: result.confidence,
                    });
                }
            }

            if result.is_speech_final {
                pending.push(TranscriptEventKind::UtteranceEndHint);
            }
        }

        for kind in pending {
            self.emit(kind);
        }
    }

    fn report_degraded(&self, reason: String) {
        let first = {
            let mut progress = self.progress.lock();
            progress.failed = true;
            !std::mem::replace(&mut progress.degraded_reported, true)
        };
        if first {
            warn!(utterance_id = self.utterance_id, "Transcription degraded: {}", reason);
            self.emit(TranscriptEventKind::DegradedMode { reason });
        }
    }

    fn has_failed(&self) -> bool {
        self.progress.lock().failed
    }
}

/// Opens per-utterance transcript streams against one provider.
#[derive(Clone)]
pub struct TranscriptCoordinator {
    provider: Arc<dyn TranscriptionProvider>,
    config: CoordinatorConfig,
}

impl TranscriptCoordinator {
    pub fn new(provider: Arc<dyn TranscriptionProvider>, config: CoordinatorConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Begin transcribing a new utterance.
    ///
    /// Returns immediately; the provider connection is opened in the
    /// background and audio fed before it is ready is queued.
    pub fn start(
        &self,
        utterance_id: u64,
        events: mpsc::UnboundedSender<TranscriptEvent>,
    ) -> TranscriptHandle {
        let emitter = StreamEmitter {
            utterance_id,
            events,
            progress: Arc::new(Mutex::new(StreamProgress::default())),
            early_trigger_threshold: self.config.early_trigger_threshold,
            min_early_trigger_chars: self.config.min_early_trigger_chars,
        };

        let (slice_tx, slice_rx) = mpsc::channel(self.config.slice_queue_depth.max(1));
        let pump = tokio::spawn(run_stream(
            self.provider.clone(),
            slice_rx,
            emitter.clone(),
        ));

        debug!(utterance_id, provider = self.provider.name(), "Transcript stream started");

        TranscriptHandle {
            utterance_id,
            config: self.config.clone(),
            provider: self.provider.clone(),
            slices: Some(slice_tx),
            pending_slice: Vec::new(),
            utterance_audio: Vec::new(),
            audio_bytes: 0,
            pump: Some(pump),
            emitter,
        }
    }
}

async fn run_stream(
    provider: Arc<dyn TranscriptionProvider>,
    mut slices: mpsc::Receiver<Vec<u8>>,
    emitter: StreamEmitter,
) {
    let TranscriptionStream { audio, mut results } = match provider.open_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            emitter.report_degraded(format!("failed to open transcription stream: {e}"));
            return;
        }
    };

    let mut audio = Some(audio);

    loop {
        tokio::select! {
            slice = slices.recv(), if audio.is_some() => match slice {
                Some(slice) => {
                    if let Some(tx) = &audio
                        && tx.send(slice).await.is_err()
                    {
                        emitter.report_degraded("transcription stream rejected audio".to_string());
                        return;
                    }
                }
                None => {
                    // Dropping the provider sender requests a graceful flush.
                    audio = None;
                }
            },
            result = results.recv() => match result {
                Some(Ok(result)) => emitter.on_result(result),
                Some(Err(e)) => {
                    emitter.report_degraded(format!("transcription stream error: {e}"));
                    return;
                }
                None => {
                    if audio.is_some() {
                        emitter.report_degraded(STTError::StreamClosed.to_string());
                    }
                    return;
                }
            }
        }
    }
}

/// Live transcript stream for one utterance.
pub struct TranscriptHandle {
    utterance_id: u64,
    config: CoordinatorConfig,
    provider: Arc<dyn TranscriptionProvider>,
    slices: Option<mpsc::Sender<Vec<u8>>>,
    pending_slice: Vec<u8>,
    /// Tail of the utterance kept for the single-shot fallback.
    utterance_audio: Vec<u8>,
    /// Total bytes fed, including audio trimmed from `utterance_audio`.
    audio_bytes: usize,
    pump: Option<JoinHandle<()>>,
    emitter: StreamEmitter,
}

impl TranscriptHandle {
    pub fn utterance_id(&self) -> u64 {
        self.utterance_id
    }

    pub fn early_triggered(&self) -> bool {
        self.emitter.progress.lock().early_fired
    }

    /// Buffer a chunk of utterance audio. Never blocks.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer_for_fallback(chunk);

        if self.emitter.has_failed() {
            self.slices = None;
            self.pending_slice.clear();
            return;
        }

        self.pending_slice.extend_from_slice(chunk);
        if self.pending_slice.len() >= self.config.slice_bytes() {
            self.flush_slice();
        }
    }

    /// Trims in slice-sized steps once the tail exceeds `max_buffered_ms`.
    fn buffer_for_fallback(&mut self, chunk: &[u8]) {
        self.audio_bytes += chunk.len();
        self.utterance_audio.extend_from_slice(chunk);

        let cap = self.config.max_buffered_bytes();
        if self.utterance_audio.len() > cap + self.config.slice_bytes() {
            let excess = (self.utterance_audio.len() - cap) & !1;
            self.utterance_audio.drain(..excess);
        }
    }

    fn flush_slice(&mut self) {
        if self.pending_slice.is_empty() {
            return;
        }
        let slice = std::mem::take(&mut self.pending_slice);
        if let Some(tx) = &self.slices {
            match tx.try_send(slice) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        utterance_id = self.utterance_id,
                        "Transcript slice queue full, dropping slice"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    self.slices = None;
                }
            }
        }
    }

    /// Close the stream and produce the utterance transcript.
    ///
    /// Falls back to a single-shot request with the buffered utterance audio
    /// when the stream failed at any point. Only the fallback itself failing is an error.
    pub async fn finalize(mut self) -> Result<FinalTranscript, STTError> {
        self.flush_slice();
        self.slices = None;

        if let Some(pump) = self.pump.take() {
            let abort = pump.abort_handle();
            if tokio::time::timeout(self.config.flush_timeout, pump)
                .await
                .is_err()
            {
                abort.abort();
                self.emitter
                    .report_degraded("transcription stream did not flush in time".to_string());
            }
        }

        let audio_seconds =
            (self.audio_bytes / 2) as f64 / self.config.sample_rate.max(1) as f64;

        let (failed, text, confidence, early_triggered) = {
            let progress = self.emitter.progress.lock();
            (
                progress.failed,
                progress.accumulated(),
                progress.last_confidence,
                progress.early_fired,
            )
        };

        if !failed {
            return Ok(FinalTranscript {
                text,
                confidence,
                degraded: false,
                early_triggered,
                audio_seconds,
            });
        }

        info!(
            utterance_id = self.utterance_id,
            bytes = self.utterance_audio.len(),
            "Falling back to single-shot transcription"
        );
        let result = self.provider.transcribe_once(&self.utterance_audio).await?;

        Ok(FinalTranscript {
            text: result.transcript.trim().to_string(),
            confidence: result.confidence,
            degraded: true,
            early_triggered,
            audio_seconds,
        })
    }
}

impl Drop for TranscriptHandle {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
