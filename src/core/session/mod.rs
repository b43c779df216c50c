//! # Dialogue session
//!
//! A [`Session`] is the turn state machine for one client connection. It is
//! owned by the connection task and driven from three directions:
//!
//! - inbound audio via [`Session::handle_audio`], classified on every chunk
//! - client control messages (`reply`, interruption settings)
//! - signals from its own background tasks, read through [`SessionInputs`]
//!   and applied with [`Session::handle_signal`]
//!
//! ```text
//!            end of utterance                reply ready
//! LISTENING ─────────────────► PROCESSING ─────────────────► RESPONDING
//!     ▲                                                          │
//!     └──────────── completion, or sustained-speech interruption ┘
//! ```
//!
//! Everything the client should see is pushed, in order, onto the
//! [`SessionEvent`] channel handed to [`Session::new`].

mod audio;
pub mod config;
pub mod errors;
pub mod events;
pub mod info;
mod interruption;
mod lifecycle;
pub mod registry;
mod reply;
mod transcript;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::llm::{DialogueLine, ReplyError, ReplyGenerator};
use crate::core::stt::{TranscriptCoordinator, TranscriptEvent, TranscriptHandle};
use crate::core::telemetry::TelemetrySink;
use crate::core::tts::{ResponseHandle, ResponseStreamer};
use crate::core::turn::{InterruptionLedger, InterruptionSettings};
use crate::core::vad::{SilenceTracker, VoiceActivityClassifier};

use audio::PreRoll;

pub use config::{InterruptionDefaults, SessionConfig};
pub use errors::{SessionError, SessionResult};
pub use events::{InterruptionReport, SessionEvent, SessionSignal};
pub use info::{SessionInfo, SessionStatus};
pub use registry::SessionRegistry;

/// Collaborators shared by every session of the process.
#[derive(Clone)]
pub struct SessionServices {
    pub transcripts: TranscriptCoordinator,
    pub streamer: ResponseStreamer,
    /// When absent, replies must come from the client's `reply` message.
    pub generator: Option<Arc<dyn ReplyGenerator>>,
    pub telemetry: TelemetrySink,
}

/// Receiving ends of a session's internal channels.
pub struct SessionInputs {
    transcripts: mpsc::UnboundedReceiver<TranscriptEvent>,
    signals: mpsc::UnboundedReceiver<SessionSignal>,
}

impl SessionInputs {
    /// Next signal for the session, from either channel.
    pub async fn next(&mut self) -> Option<SessionSignal> {
        tokio::select! {
            Some(event) = self.transcripts.recv() => Some(SessionSignal::Transcript(event)),
            Some(signal) = self.signals.recv() => Some(signal),
            else => None,
        }
    }
}

/// Utterance currently being heard, or the one just finalized.
#[derive(Default)]
pub(crate) struct Utterance {
    pub(crate) id: u64,
    pub(crate) transcript: Option<TranscriptHandle>,
    pub(crate) chunks: u64,
    pub(crate) audio_ms: u64,
    pub(crate) classify_time: Duration,
}

/// An in-flight reply generation.
pub(crate) struct Generation {
    pub(crate) id: u64,
    pub(crate) source_text: String,
    /// Started from an early-trigger partial and not yet matched to a final
    /// transcript.
    pub(crate) speculative: bool,
    pub(crate) task: JoinHandle<()>,
    /// Result that arrived while the generation was still speculative.
    pub(crate) result: Option<Result<String, ReplyError>>,
}

impl Drop for Generation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Turn state machine for one connection.
pub struct Session {
    pub(crate) id: String,
    pub(crate) config: SessionConfig,
    pub(crate) services: SessionServices,
    pub(crate) status: Arc<SessionStatus>,
    pub(crate) voice: String,

    pub(crate) events: mpsc::UnboundedSender<SessionEvent>,
    pub(crate) signals: mpsc::UnboundedSender<SessionSignal>,
    pub(crate) transcript_events: mpsc::UnboundedSender<TranscriptEvent>,

    pub(crate) classifier: VoiceActivityClassifier,
    pub(crate) silence: SilenceTracker,
    /// Whether the previous chunk was part of sustained speech.
    pub(crate) sustained: bool,

    /// Audio kept from before the current utterance's speech started.
    pub(crate) pre_roll: PreRoll,
    pub(crate) utterance: Utterance,
    pub(crate) finalize_task: Option<JoinHandle<()>>,
    pub(crate) generation: Option<Generation>,
    pub(crate) next_generation_id: u64,
    pub(crate) response: Option<ResponseHandle>,

    pub(crate) interruption: InterruptionSettings,
    pub(crate) ledger: InterruptionLedger,

    pub(crate) history: VecDeque<DialogueLine>,

    pub(crate) state_entered_at: Instant,
    /// Response chunks sent when the watchdog last saw progress.
    pub(crate) watchdog_chunks: usize,
}

// Sessions move into the connection task.
const _: () = {
    const fn assert_send<T: Send>() {}
    let _ = assert_send::<Session>;
};
