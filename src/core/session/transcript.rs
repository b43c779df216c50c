//! Transcript events from the coordinator and the finalized utterance.

use tracing::{debug, info, warn};

use crate::core::llm::DialogueLine;
use crate::core::stt::{FinalTranscript, STTError, TranscriptEvent, TranscriptEventKind};
use crate::core::telemetry::{CostEvent, Stage};
use crate::core::turn::ConversationState;

use super::{Session, SessionEvent};

impl Session {
    pub(crate) fn on_transcript_event(&mut self, event: TranscriptEvent) {
        if event.utterance_id != self.utterance.id {
            debug!(
                session_id = %self.id,
                utterance_id = event.utterance_id,
                "Ignoring transcript event for a previous utterance"
            );
            return;
        }

        match event.kind {
            TranscriptEventKind::Partial { text, confidence } => {
                self.emit(SessionEvent::TranscriptPartial { text, confidence });
            }
            TranscriptEventKind::EarlyTrigger { text, confidence } => {
                info!(
                    session_id = %self.id,
                    confidence,
                    "Early trigger on partial transcript"
                );
                self.emit(SessionEvent::EarlyTrigger {
                    text: text.clone(),
                    confidence,
                });
                if self.state() == ConversationState::Listening && self.generation.is_none() {
                    self.start_generation(text, true);
                }
            }
            TranscriptEventKind::UtteranceEndHint => {
                // The collaborator alone never ends an utterance.
                if self.state() == ConversationState::Listening && self.silence.in_silence_gap() {
                    self.end_utterance("utterance end corroborated");
                }
            }
            TranscriptEventKind::DegradedMode { reason } => {
                warn!(session_id = %self.id, "Transcription degraded: {}", reason);
                self.emit(SessionEvent::DegradedMode { reason });
            }
        }
    }

    pub(crate) fn on_transcript_final(
        &mut self,
        utterance_id: u64,
        result: Result<FinalTranscript, STTError>,
    ) {
        self.finalize_task = None;
        if utterance_id != self.utterance.id || self.state() != ConversationState::Processing {
            debug!(
                session_id = %self.id,
                utterance_id,
                "Discarding final transcript for an abandoned turn"
            );
            return;
        }

        let transcript = match result {
            Ok(transcript) => transcript,
            Err(e) => {
                self.degrade_turn(format!("transcription failed: {e}"));
                return;
            }
        };

        self.services.telemetry.record(
            CostEvent::new(self.id.as_str(), self.turn(), Stage::Transcription)
                .with_audio_seconds(transcript.audio_seconds)
                .with_characters(transcript.text.chars().count()),
        );

        info!(
            session_id = %self.id,
            turn = self.turn(),
            degraded = transcript.degraded,
            "Final transcript: {}",
            transcript.text
        );
        self.emit(SessionEvent::TranscriptFinal {
            text: transcript.text.clone(),
            confidence: transcript.confidence,
            degraded: transcript.degraded,
        });

        if transcript.text.trim().is_empty() {
            self.generation = None;
            self.transition(ConversationState::Processing, ConversationState::Listening);
            return;
        }

        // Generation context is the history before this utterance.
        self.adopt_or_generate(&transcript.text);
        self.push_history(DialogueLine::user(transcript.text));
    }

    /// End the current turn without a response.
    pub(crate) fn degrade_turn(&mut self, reason: String) {
        warn!(session_id = %self.id, turn = self.turn(), "Degraded turn: {}", reason);
        let state = self.state();
        self.abandon_turn();
        self.emit(SessionEvent::DegradedTurn { reason });
        if state != ConversationState::Listening {
            self.transition(state, ConversationState::Listening);
        }
    }
}
