//! Events a session emits toward its client, and signals it receives from
//! its own background tasks.

use std::time::Duration;

use serde::Serialize;

use crate::core::llm::ReplyError;
use crate::core::stt::{FinalTranscript, STTError, TranscriptEvent};
use crate::core::tts::AudioData;
use crate::core::turn::{ConversationState, InterruptionEvent, InterruptionStats};

/// Interruption settings and history, as reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterruptionReport {
    pub enabled: bool,
    pub threshold: f32,
    pub cooldown_ms: u64,
    #[serde(flatten)]
    pub stats: InterruptionStats,
    pub has_active_response: bool,
    pub response_chunks_sent: usize,
}

/// Everything the session tells its client, in emission order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        from: ConversationState,
        to: ConversationState,
        turn: u64,
    },
    /// Onset of sustained speech.
    SpeechDetected {
        confidence: f32,
        energy: f32,
        state: ConversationState,
    },
    TranscriptPartial {
        text: String,
        confidence: f32,
    },
    EarlyTrigger {
        text: String,
        confidence: f32,
    },
    TranscriptFinal {
        text: String,
        confidence: f32,
        degraded: bool,
    },
    /// The streaming transcription connection failed for this utterance.
    DegradedMode {
        reason: String,
    },
    /// The turn could not be completed; the session is back in LISTENING.
    DegradedTurn {
        reason: String,
    },
    ResponseStarted {
        turn: u64,
        total_chunks: usize,
    },
    AudioChunk {
        turn: u64,
        sequence: usize,
        total_chunks: usize,
        text: String,
        audio: AudioData,
    },
    ResponseComplete {
        turn: u64,
        chunks_sent: usize,
        total_chunks: usize,
    },
    InterruptionDetected(InterruptionEvent),
    ResponseInterrupted {
        turn: u64,
        chunks_sent: usize,
        total_chunks: usize,
    },
    InterruptionConfigured {
        enabled: bool,
        threshold: f32,
        cooldown_ms: u64,
    },
    InterruptionToggled {
        enabled: bool,
    },
    InterruptionStats(InterruptionReport),
    Error {
        message: String,
    },
}

/// Results handed back to the session by the tasks it spawned.
#[derive(Debug)]
pub enum SessionSignal {
    Transcript(TranscriptEvent),
    TranscriptFinal {
        utterance_id: u64,
        result: Result<FinalTranscript, STTError>,
    },
    ReplyReady {
        generation_id: u64,
        source_text: String,
        result: Result<String, ReplyError>,
        elapsed: Duration,
    },
    ResponseFinished {
        turn: u64,
        chunks_sent: usize,
        total_chunks: usize,
    },
}
