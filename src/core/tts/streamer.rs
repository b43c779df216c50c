//! # Cancellable response streaming
//!
//! A reply is split into chunks and synthesized one chunk at a time by a
//! background task. Each [`ResponseStream`] carries an atomic tri-state
//! status (`running`, `cancelled`, `completed`) and a send gate. The task
//! delivers a chunk only while holding the gate and only if the status is
//! still `running`; [`ResponseStream::cancel`] flips the status under the same
//! gate. Once `cancel` returns `true`, no further chunk reaches the sink.
//!
//! Completion and cancellation race through one compare-and-set: whichever
//! leaves `running` first wins, and the loser is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::base::{AudioData, SynthesisProvider, TTSError};
use super::chunker::split_reply;
use crate::core::telemetry::{CostEvent, Stage, TelemetrySink};

/// Lifecycle of one response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamStatus {
    Running = 0,
    Cancelled = 1,
    Completed = 2,
}

impl StreamStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => StreamStatus::Running,
            1 => StreamStatus::Cancelled,
            _ => StreamStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Running => "running",
            StreamStatus::Cancelled => "cancelled",
            StreamStatus::Completed => "completed",
        }
    }
}

/// One synthesized chunk on its way to the client.
#[derive(Debug, Clone)]
pub struct ResponseChunk {
    pub turn: u64,
    /// Zero-based position of this chunk in the reply
    pub sequence: usize,
    pub total_chunks: usize,
    pub text: String,
    pub audio: AudioData,
}

/// Receiver of a stream's output.
///
/// `deliver` is called while the send gate is held, so it must not block.
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, chunk: ResponseChunk);

    /// Called once, after the last chunk, when the stream finished without
    /// being cancelled.
    fn completed(&self, turn: u64, chunks_sent: usize, total_chunks: usize);
}

/// Shared state of one in-flight reply.
pub struct ResponseStream {
    turn: u64,
    chunks: Vec<String>,
    status: AtomicU8,
    next_index: AtomicUsize,
    chunks_sent: AtomicUsize,
    gate: Mutex<()>,
    token: CancellationToken,
}

impl ResponseStream {
    fn new(turn: u64, chunks: Vec<String>) -> Self {
        Self {
            turn,
            chunks,
            status: AtomicU8::new(StreamStatus::Running as u8),
            next_index: AtomicUsize::new(0),
            chunks_sent: AtomicUsize::new(0),
            gate: Mutex::new(()),
            token: CancellationToken::new(),
        }
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent.load(Ordering::Acquire)
    }

    /// Index of the chunk currently being synthesized.
    pub fn next_index(&self) -> usize {
        self.next_index.load(Ordering::Acquire)
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.status() == StreamStatus::Running
    }

    /// Move `running -> cancelled` and fire the cancellation token.
    ///
    /// Returns `false` if the stream already completed or was cancelled.
    pub fn cancel(&self) -> bool {
        let cancelled = {
            let _gate = self.gate.lock();
            self.transition(StreamStatus::Running, StreamStatus::Cancelled)
        };
        if cancelled {
            self.token.cancel();
        }
        cancelled
    }

    fn complete(&self) -> bool {
        let _gate = self.gate.lock();
        self.transition(StreamStatus::Running, StreamStatus::Completed)
    }

    /// Run `send` under the gate if the stream is still running.
    fn send_if_running(&self, send: impl FnOnce()) -> bool {
        let _gate = self.gate.lock();
        if self.status() != StreamStatus::Running {
            return false;
        }
        send();
        self.chunks_sent.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn transition(&self, from: StreamStatus, to: StreamStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// How a stream task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { chunks_sent: usize },
    Cancelled { chunks_sent: usize },
}

/// Owner's handle to a running stream. Dropping it cancels the stream.
pub struct ResponseHandle {
    stream: Arc<ResponseStream>,
    task: JoinHandle<StreamOutcome>,
}

impl ResponseHandle {
    pub fn stream(&self) -> &Arc<ResponseStream> {
        &self.stream
    }

    pub fn cancel(&self) -> bool {
        self.stream.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to acknowledge cancellation by exiting.
    ///
    /// On timeout the task is aborted and `false` is returned; anything it
    /// still produces is refused at the send gate.
    pub async fn wait_ack(&mut self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(_) => true,
            Err(_) => {
                self.task.abort();
                false
            }
        }
    }

    /// Wait for the task to finish on its own.
    pub async fn join(mut self) -> Option<StreamOutcome> {
        (&mut self.task).await.ok()
    }
}

impl Drop for ResponseHandle {
    fn drop(&mut self) {
        self.stream.cancel();
        self.task.abort();
    }
}

/// Starts response streams against one synthesis collaborator.
#[derive(Clone)]
pub struct ResponseStreamer {
    synthesizer: Arc<dyn SynthesisProvider>,
    max_chunk_chars: usize,
    telemetry: Option<TelemetrySink>,
}

impl ResponseStreamer {
    pub fn new(synthesizer: Arc<dyn SynthesisProvider>, max_chunk_chars: usize) -> Self {
        Self {
            synthesizer,
            max_chunk_chars,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn default_voice(&self) -> &str {
        self.synthesizer.default_voice()
    }

    /// Chunks `reply_text` would be streamed as.
    pub fn split(&self, reply_text: &str) -> Vec<String> {
        split_reply(reply_text, self.max_chunk_chars)
    }

    /// Split `reply_text` and spawn the streaming task.
    pub fn start(
        &self,
        session_id: &str,
        turn: u64,
        reply_text: &str,
        voice: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> ResponseHandle {
        self.start_chunks(session_id, turn, self.split(reply_text), voice, sink)
    }

    /// Spawn the streaming task for chunks that were already split.
    pub fn start_chunks(
        &self,
        session_id: &str,
        turn: u64,
        chunks: Vec<String>,
        voice: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> ResponseHandle {
        let stream = Arc::new(ResponseStream::new(turn, chunks));

        info!(
            session_id = %session_id,
            turn,
            total_chunks = stream.total_chunks(),
            "Starting response stream"
        );

        let task = tokio::spawn(run_stream(
            stream.clone(),
            self.synthesizer.clone(),
            voice.to_string(),
            session_id.to_string(),
            sink,
            self.telemetry.clone(),
        ));

        ResponseHandle { stream, task }
    }
}

async fn run_stream(
    stream: Arc<ResponseStream>,
    synthesizer: Arc<dyn SynthesisProvider>,
    voice: String,
    session_id: String,
    sink: Arc<dyn ResponseSink>,
    telemetry: Option<TelemetrySink>,
) -> StreamOutcome {
    let total_chunks = stream.total_chunks();

    for (index, text) in stream.chunks().iter().enumerate() {
        if !stream.is_running() {
            break;
        }
        stream.next_index.store(index, Ordering::Release);

        let started = Instant::now();
        let audio = tokio::select! {
            biased;
            _ = stream.token.cancelled() => break,
            result = synthesizer.synthesize(text, &voice, &stream.token) => result,
        };

        let audio = match audio {
            Ok(audio) => audio,
            Err(TTSError::Cancelled) => break,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    turn = stream.turn(),
                    chunk = index,
                    "Synthesis failed, skipping chunk: {}",
                    e
                );
                continue;
            }
        };

        let chunk = ResponseChunk {
            turn: stream.turn(),
            sequence: index,
            total_chunks,
            text: text.clone(),
            audio,
        };
        if !stream.send_if_running(|| sink.deliver(chunk)) {
            debug!(
                session_id = %session_id,
                chunk = index,
                "Discarded synthesized chunk after cancellation"
            );
            break;
        }

        if let Some(telemetry) = &telemetry {
            telemetry.record(
                CostEvent::new(session_id.as_str(), stream.turn(), Stage::Synthesis)
                    .with_duration(started.elapsed())
                    .with_characters(text.chars().count()),
            );
        }
    }

    let chunks_sent = stream.chunks_sent();
    if stream.complete() {
        debug!(
            session_id = %session_id,
            turn = stream.turn(),
            chunks_sent,
            "Response stream completed"
        );
        sink.completed(stream.turn(), chunks_sent, total_chunks);
        StreamOutcome::Completed { chunks_sent }
    } else {
        debug!(
            session_id = %session_id,
            turn = stream.turn(),
            chunks_sent,
            "Response stream cancelled"
        );
        StreamOutcome::Cancelled { chunks_sent }
    }
}
