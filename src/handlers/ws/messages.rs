//! WebSocket message types and routing
//!
//! This module defines every JSON message exchanged with the client and the
//! conversion from session events to the wire format.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::core::session::{InterruptionReport, SessionEvent};
use crate::core::turn::ConversationState;

/// WebSocket message types for incoming messages
///
/// Audio is not a JSON message; it arrives as binary frames of PCM16 mono.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    /// Reply text supplied by the client while the session is processing
    #[serde(rename = "reply")]
    Reply { text: String },
    #[serde(rename = "configure_interruption")]
    ConfigureInterruption {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cooldown_ms: Option<u64>,
    },
    #[serde(rename = "enable_interruption")]
    EnableInterruption { enabled: bool },
    #[serde(rename = "get_interruption_stats")]
    GetInterruptionStats,
    #[serde(rename = "ping")]
    Ping,
}

/// WebSocket message types for outgoing messages
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "connected")]
    Connected { session_id: String },
    #[serde(rename = "state_changed")]
    StateChanged {
        from: ConversationState,
        to: ConversationState,
        turn: u64,
    },
    #[serde(rename = "speech_detected")]
    SpeechDetected {
        confidence: f32,
        energy: f32,
        conversation_state: ConversationState,
    },
    #[serde(rename = "transcript_partial")]
    TranscriptPartial { text: String, confidence: f32 },
    #[serde(rename = "early_trigger")]
    EarlyTrigger { text: String, confidence: f32 },
    #[serde(rename = "transcript_final")]
    TranscriptFinal {
        text: String,
        confidence: f32,
        degraded: bool,
    },
    #[serde(rename = "degraded_mode")]
    DegradedMode { reason: String },
    #[serde(rename = "degraded_turn")]
    DegradedTurn { reason: String },
    #[serde(rename = "response_started")]
    ResponseStarted { turn: u64, total_chunks: usize },
    #[serde(rename = "audio_chunk")]
    AudioChunk {
        turn: u64,
        sequence: usize,
        total_chunks: usize,
        text: String,
        /// Base64 of the synthesized audio bytes
        payload: String,
        format: String,
        sample_rate: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u32>,
    },
    #[serde(rename = "response_complete")]
    ResponseComplete {
        turn: u64,
        chunks_sent: usize,
        total_chunks: usize,
    },
    #[serde(rename = "interruption_detected")]
    InterruptionDetected {
        confidence: f32,
        energy: f32,
        chunks_interrupted: usize,
        total_chunks: usize,
        latency_ms: f64,
        /// Detection time in milliseconds since the epoch
        timestamp: u64,
    },
    #[serde(rename = "response_interrupted")]
    ResponseInterrupted {
        turn: u64,
        chunks_sent: usize,
        total_chunks: usize,
    },
    #[serde(rename = "interruption_configured")]
    InterruptionConfigured {
        enabled: bool,
        threshold: f32,
        cooldown_ms: u64,
    },
    #[serde(rename = "interruption_toggled")]
    InterruptionToggled { enabled: bool },
    #[serde(rename = "interruption_stats")]
    InterruptionStats(InterruptionReport),
    #[serde(rename = "pong")]
    Pong { timestamp: i64 },
    #[serde(rename = "error")]
    Error { message: String },
}

impl From<SessionEvent> for OutgoingMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::StateChanged { from, to, turn } => {
                OutgoingMessage::StateChanged { from, to, turn }
            }
            SessionEvent::SpeechDetected {
                confidence,
                energy,
                state,
            } => OutgoingMessage::SpeechDetected {
                confidence,
                energy,
                conversation_state: state,
            },
            SessionEvent::TranscriptPartial { text, confidence } => {
                OutgoingMessage::TranscriptPartial { text, confidence }
            }
            SessionEvent::EarlyTrigger { text, confidence } => {
                OutgoingMessage::EarlyTrigger { text, confidence }
            }
            SessionEvent::TranscriptFinal {
                text,
                confidence,
                degraded,
            } => OutgoingMessage::TranscriptFinal {
                text,
                confidence,
                degraded,
            },
            SessionEvent::DegradedMode { reason } => OutgoingMessage::DegradedMode { reason },
            SessionEvent::DegradedTurn { reason } => OutgoingMessage::DegradedTurn { reason },
            SessionEvent::ResponseStarted { turn, total_chunks } => {
                OutgoingMessage::ResponseStarted { turn, total_chunks }
            }
            SessionEvent::AudioChunk {
                turn,
                sequence,
                total_chunks,
                text,
                audio,
            } => OutgoingMessage::AudioChunk {
                turn,
                sequence,
                total_chunks,
                text,
                payload: BASE64.encode(&audio.data),
                format: audio.format,
                sample_rate: audio.sample_rate,
                duration_ms: audio.duration_ms,
            },
            SessionEvent::ResponseComplete {
                turn,
                chunks_sent,
                total_chunks,
            } => OutgoingMessage::ResponseComplete {
                turn,
                chunks_sent,
                total_chunks,
            },
            SessionEvent::InterruptionDetected(event) => OutgoingMessage::InterruptionDetected {
                confidence: event.confidence,
                energy: event.energy,
                chunks_interrupted: event.chunks_delivered,
                total_chunks: event.total_chunks,
                latency_ms: event.latency_ms(),
                timestamp: event.detected_at_ms,
            },
            SessionEvent::ResponseInterrupted {
                turn,
                chunks_sent,
                total_chunks,
            } => OutgoingMessage::ResponseInterrupted {
                turn,
                chunks_sent,
                total_chunks,
            },
            SessionEvent::InterruptionConfigured {
                enabled,
                threshold,
                cooldown_ms,
            } => OutgoingMessage::InterruptionConfigured {
                enabled,
                threshold,
                cooldown_ms,
            },
            SessionEvent::InterruptionToggled { enabled } => {
                OutgoingMessage::InterruptionToggled { enabled }
            }
            SessionEvent::InterruptionStats(report) => OutgoingMessage::InterruptionStats(report),
            SessionEvent::Error { message } => OutgoingMessage::Error { message },
        }
    }
}

/// What the sender task should do next.
pub enum MessageRoute {
    Outgoing(OutgoingMessage),
    /// Send a close frame and stop.
    Close,
}
