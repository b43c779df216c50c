//! Session construction, state transitions, the watchdog and teardown.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::llm::DialogueLine;
use crate::core::turn::{ConversationState, InterruptionLedger, InterruptionSettings};
use crate::core::vad::{SilenceTracker, VoiceActivityClassifier};

use super::{
    PreRoll, Session, SessionConfig, SessionEvent, SessionInputs, SessionServices,
    SessionSignal, SessionStatus, Utterance,
};

impl Session {
    /// Create a session in LISTENING.
    ///
    /// Client-facing events are pushed onto `events`; the returned
    /// [`SessionInputs`] must be polled and fed back through
    /// [`Session::handle_signal`].
    pub fn new(
        id: impl Into<String>,
        config: SessionConfig,
        services: SessionServices,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> (Self, SessionInputs) {
        let id = id.into();
        let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let voice = config
            .voice
            .clone()
            .unwrap_or_else(|| services.streamer.default_voice().to_string());
        let interruption = InterruptionSettings::new(
            config.interruption.enabled,
            config.interruption.threshold,
            config.interruption.cooldown_ms,
        );

        info!(
            session_id = %id,
            threshold = interruption.threshold(),
            cooldown_ms = interruption.cooldown_ms(),
            "Session created"
        );

        let session = Self {
            status: Arc::new(SessionStatus::new(id.clone())),
            classifier: VoiceActivityClassifier::new(config.classifier.clone()),
            silence: SilenceTracker::new(config.silence.clone()),
            history: VecDeque::with_capacity(config.history_limit),
            id,
            config,
            services,
            voice,
            events,
            signals: signal_tx,
            transcript_events: transcript_tx,
            sustained: false,
            pre_roll: PreRoll::default(),
            utterance: Utterance::default(),
            finalize_task: None,
            generation: None,
            next_generation_id: 0,
            response: None,
            interruption,
            ledger: InterruptionLedger::default(),
            state_entered_at: Instant::now(),
            watchdog_chunks: 0,
        };

        let inputs = SessionInputs {
            transcripts: transcript_rx,
            signals: signal_rx,
        };

        (session, inputs)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> &Arc<SessionStatus> {
        &self.status
    }

    pub fn state(&self) -> ConversationState {
        self.status.state()
    }

    pub fn turn(&self) -> u64 {
        self.status.turn()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Apply one signal from the session's background tasks.
    pub async fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Transcript(event) => self.on_transcript_event(event),
            SessionSignal::TranscriptFinal {
                utterance_id,
                result,
            } => self.on_transcript_final(utterance_id, result),
            SessionSignal::ReplyReady {
                generation_id,
                source_text,
                result,
                elapsed,
            } => self.on_reply_ready(generation_id, source_text, result, elapsed),
            SessionSignal::ResponseFinished {
                turn,
                chunks_sent,
                total_chunks,
            } => self.on_response_finished(turn, chunks_sent, total_chunks),
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!(session_id = %self.id, "Client event channel closed");
        }
    }

    /// Move `from -> to`, announcing the change. Entering LISTENING starts a
    /// fresh listening period.
    pub(crate) fn transition(&mut self, from: ConversationState, to: ConversationState) -> bool {
        if !self.status.state.transition(from, to) {
            warn!(
                session_id = %self.id,
                expected = %from,
                actual = %self.state(),
                "Rejected transition to {}",
                to
            );
            return false;
        }

        self.state_entered_at = Instant::now();
        self.watchdog_chunks = 0;
        let turn = self.turn();
        info!(session_id = %self.id, turn, "State {} -> {}", from, to);
        self.emit(SessionEvent::StateChanged { from, to, turn });

        if to == ConversationState::Listening {
            self.begin_listening();
        }
        true
    }

    fn begin_listening(&mut self) {
        self.silence.reset();
        self.pre_roll.clear();
        self.utterance.transcript = None;
    }

    pub(crate) fn push_history(&mut self, line: DialogueLine) {
        if line.text.trim().is_empty() {
            return;
        }
        while self.history.len() >= self.config.history_limit.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    /// Force the session back to LISTENING if it has been stuck outside it
    /// for longer than `max_state_duration`. Returns true if it reset.
    ///
    /// A response that is still delivering chunks counts as progress.
    pub fn check_watchdog(&mut self) -> bool {
        let state = self.state();
        if state == ConversationState::Listening {
            return false;
        }

        if let Some(response) = &self.response {
            let sent = response.stream().chunks_sent();
            if sent != self.watchdog_chunks {
                self.watchdog_chunks = sent;
                self.state_entered_at = Instant::now();
                return false;
            }
        }

        let stuck_for = self.state_entered_at.elapsed();
        if stuck_for < self.config.max_state_duration {
            return false;
        }

        warn!(
            session_id = %self.id,
            state = %state,
            stuck_ms = stuck_for.as_millis() as u64,
            "Watchdog resetting session to listening"
        );
        self.abandon_turn();
        self.emit(SessionEvent::Error {
            message: format!(
                "Session stuck in {} for {}s, reset to listening",
                state,
                stuck_for.as_secs()
            ),
        });
        self.transition(state, ConversationState::Listening);
        true
    }

    /// Drop everything belonging to the current turn.
    pub(crate) fn abandon_turn(&mut self) {
        if let Some(response) = self.response.take() {
            response.cancel();
        }
        self.generation = None;
        if let Some(task) = self.finalize_task.take() {
            task.abort();
        }
        self.utterance.transcript = None;
    }

    /// Tear the session down. Streams and tasks are cancelled immediately.
    pub fn close(&mut self) {
        self.abandon_turn();
        info!(
            session_id = %self.id,
            turn = self.turn(),
            interruptions = self.status.interruptions.load(Ordering::Relaxed),
            "Session closed"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abandon_turn();
    }
}
