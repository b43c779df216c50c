//! Inbound audio: classification on every chunk, then per-state handling.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, info};

use crate::core::telemetry::{CostEvent, Stage};
use crate::core::turn::ConversationState;
use crate::core::vad::{SpeechEvent, VADEvent};

use super::{Session, SessionEvent, SessionSignal, Utterance};

/// Audio heard in LISTENING before speech started, trimmed to a duration.
#[derive(Debug, Default)]
pub(crate) struct PreRoll {
    chunks: VecDeque<(Vec<u8>, u64)>,
    buffered_ms: u64,
    bytes: usize,
}

impl PreRoll {
    /// Append `chunk`, then drop the oldest chunks until at most `limit_ms`
    /// of audio remains.
    pub(crate) fn push(&mut self, chunk: &[u8], duration_ms: u64, limit_ms: u64) {
        self.chunks.push_back((chunk.to_vec(), duration_ms));
        self.buffered_ms += duration_ms;
        self.bytes += chunk.len();

        while self.buffered_ms > limit_ms {
            let Some((old, old_ms)) = self.chunks.pop_front() else {
                break;
            };
            self.buffered_ms -= old_ms;
            self.bytes -= old.len();
        }
    }

    pub(crate) fn drain(&mut self) -> VecDeque<(Vec<u8>, u64)> {
        self.buffered_ms = 0;
        self.bytes = 0;
        std::mem::take(&mut self.chunks)
    }

    pub(crate) fn clear(&mut self) {
        self.drain();
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn buffered_ms(&self) -> u64 {
        self.buffered_ms
    }
}

impl Session {
    /// Process one chunk of 16-bit little-endian mono PCM.
    ///
    /// Never fails. The only await is the bounded cancellation wait when the
    /// chunk interrupts a response.
    pub async fn handle_audio(&mut self, chunk: &[u8]) -> SpeechEvent {
        let started = Instant::now();
        let event = self.classifier.classify(chunk);
        let classify_time = started.elapsed();

        if event.is_sustained && !self.sustained {
            self.emit(SessionEvent::SpeechDetected {
                confidence: event.confidence,
                energy: event.energy,
                state: self.state(),
            });
        }
        self.sustained = event.is_sustained;

        match self.state() {
            ConversationState::Listening => {
                self.listen(chunk, &event);
                self.utterance.classify_time += classify_time;
            }
            ConversationState::Processing => {}
            ConversationState::Responding => {
                if self.check_interruption(&event).await {
                    // The interrupting speech opens the next utterance.
                    self.listen(chunk, &event);
                }
            }
        }

        event
    }

    /// LISTENING path: hold audio in the pre-roll until speech starts, then
    /// feed the transcript stream and watch for the end of the utterance.
    fn listen(&mut self, chunk: &[u8], event: &SpeechEvent) {
        let vad_event = self
            .silence
            .process_chunk(event.confidence, event.duration_ms);

        if self.utterance.transcript.is_none() {
            if !self.silence.is_speaking() {
                self.pre_roll
                    .push(chunk, event.duration_ms, self.config.pre_roll_ms);
                return;
            }
            self.open_utterance();
        }

        if let Some(transcript) = self.utterance.transcript.as_mut() {
            transcript.feed(chunk);
        }
        self.utterance.chunks += 1;
        self.utterance.audio_ms += event.duration_ms;

        if let Some(VADEvent::TurnEnd) = vad_event {
            self.end_utterance("silence");
        } else if self.silence.is_false_start() {
            self.discard_utterance();
        }
    }

    /// Start the transcript stream for a new utterance, replaying the pre-roll.
    fn open_utterance(&mut self) {
        let utterance_id = self.utterance.id + 1;
        let pre_roll_ms = self.pre_roll.buffered_ms();
        let pre_roll_bytes = self.pre_roll.bytes();
        let mut transcript = self
            .services
            .transcripts
            .start(utterance_id, self.transcript_events.clone());

        let mut utterance = Utterance {
            id: utterance_id,
            ..Utterance::default()
        };
        for (audio, duration_ms) in self.pre_roll.drain() {
            transcript.feed(&audio);
            utterance.chunks += 1;
            utterance.audio_ms += duration_ms;
        }
        utterance.transcript = Some(transcript);
        self.utterance = utterance;

        debug!(
            session_id = %self.id,
            utterance_id,
            pre_roll_ms,
            pre_roll_bytes,
            "Utterance started"
        );
    }

    /// Drop an utterance whose speech was too short to ever end a turn.
    fn discard_utterance(&mut self) {
        debug!(
            session_id = %self.id,
            utterance_id = self.utterance.id,
            speech_ms = self.silence.current_speech_ms(),
            "Discarding false start"
        );
        self.utterance.transcript = None;
        if self.generation.as_ref().is_some_and(|g| g.speculative) {
            self.generation = None;
        }
        self.silence.reset();
    }

    /// LISTENING -> PROCESSING. The transcript is finalized in the background
    /// and reported back as [`SessionSignal::TranscriptFinal`].
    pub(crate) fn end_utterance(&mut self, reason: &str) {
        if self.state() != ConversationState::Listening {
            return;
        }
        let Some(transcript) = self.utterance.transcript.take() else {
            return;
        };

        let turn = self.status.turn.fetch_add(1, Ordering::AcqRel) + 1;
        info!(
            session_id = %self.id,
            turn,
            utterance_id = self.utterance.id,
            speech_ms = self.silence.current_speech_ms(),
            "End of utterance ({})",
            reason
        );

        self.services.telemetry.record(
            CostEvent::new(self.id.as_str(), turn, Stage::Classification)
                .with_duration(self.utterance.classify_time)
                .with_audio_seconds(self.utterance.audio_ms as f64 / 1000.0),
        );

        if !self.transition(ConversationState::Listening, ConversationState::Processing) {
            return;
        }

        let utterance_id = transcript.utterance_id();
        let signals = self.signals.clone();
        self.finalize_task = Some(tokio::spawn(async move {
            let result = transcript.finalize().await;
            let _ = signals.send(SessionSignal::TranscriptFinal {
                utterance_id,
                result,
            });
        }));
    }
}
