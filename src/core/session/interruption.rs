//! Barge-in: cancelling the current response when the user talks over it,
//! plus the client's runtime interruption controls.

use std::sync::atomic::Ordering;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::llm::DialogueLine;
use crate::core::turn::{ConversationState, InterruptionEvent};
use crate::core::vad::SpeechEvent;

use super::{InterruptionReport, Session, SessionEvent};

impl Session {
    /// Cancel the active response if `event` qualifies as an interruption.
    ///
    /// Returns true when the response was cancelled and the session moved
    /// back to LISTENING.
    pub(crate) async fn check_interruption(&mut self, event: &SpeechEvent) -> bool {
        if !self.interruption.enabled()
            || !event.is_sustained
            || event.confidence < self.interruption.threshold()
        {
            return false;
        }

        let Some(response) = self.response.as_ref() else {
            return false;
        };
        if !response.stream().is_running() {
            return false;
        }

        let cooldown = self.interruption.cooldown();
        if !self.ledger.cooldown_elapsed(event.timestamp, cooldown) {
            debug!(
                session_id = %self.id,
                cooldown_ms = cooldown.as_millis() as u64,
                "Interruption suppressed by cooldown"
            );
            return false;
        }

        // Completion may have won the race since the check above.
        if !response.cancel() {
            return false;
        }

        let detected_at = event.timestamp;
        self.ledger.mark(detected_at);

        let Some(mut response) = self.response.take() else {
            return false;
        };
        if !response.wait_ack(self.config.cancel_ack_timeout).await {
            warn!(
                session_id = %self.id,
                timeout_ms = self.config.cancel_ack_timeout.as_millis() as u64,
                "Response task did not acknowledge cancellation in time"
            );
        }
        let latency = detected_at.elapsed();
        self.ledger.record_latency(latency);

        let stream = response.stream().clone();
        let chunks_sent = stream.chunks_sent();
        let total_chunks = stream.total_chunks();
        let turn = stream.turn();

        let interruption = InterruptionEvent {
            detected_at,
            detected_at_ms: Utc::now().timestamp_millis().max(0) as u64,
            confidence: event.confidence,
            energy: event.energy,
            chunks_delivered: chunks_sent,
            total_chunks,
            cancellation_latency: latency,
        };
        self.status.interruptions.fetch_add(1, Ordering::Relaxed);

        info!(
            session_id = %self.id,
            turn,
            confidence = event.confidence,
            chunks_sent,
            total_chunks,
            latency_ms = interruption.latency_ms(),
            "User interrupted response"
        );

        self.emit(SessionEvent::InterruptionDetected(interruption));
        self.emit(SessionEvent::ResponseInterrupted {
            turn,
            chunks_sent,
            total_chunks,
        });

        // Only what the user actually heard stays in the dialogue history.
        let heard = stream
            .chunks()
            .iter()
            .take(chunks_sent)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        self.push_history(DialogueLine::assistant(heard));

        drop(response);
        self.transition(ConversationState::Responding, ConversationState::Listening)
    }

    /// Update the threshold and/or cooldown. Values are clamped into range.
    pub fn configure_interruption(&mut self, threshold: Option<f32>, cooldown_ms: Option<u64>) {
        if let Some(threshold) = threshold {
            self.interruption.set_threshold(threshold);
        }
        if let Some(cooldown_ms) = cooldown_ms {
            self.interruption.set_cooldown_ms(cooldown_ms);
        }

        info!(
            session_id = %self.id,
            threshold = self.interruption.threshold(),
            cooldown_ms = self.interruption.cooldown_ms(),
            "Interruption settings updated"
        );
        self.emit(SessionEvent::InterruptionConfigured {
            enabled: self.interruption.enabled(),
            threshold: self.interruption.threshold(),
            cooldown_ms: self.interruption.cooldown_ms(),
        });
    }

    pub fn enable_interruption(&mut self, enabled: bool) {
        self.interruption.set_enabled(enabled);
        info!(session_id = %self.id, enabled, "Interruption toggled");
        self.emit(SessionEvent::InterruptionToggled { enabled });
    }

    pub fn interruption_report(&self) -> InterruptionReport {
        let (has_active_response, response_chunks_sent) = match &self.response {
            Some(response) => (
                response.stream().is_running(),
                response.stream().chunks_sent(),
            ),
            None => (false, 0),
        };

        InterruptionReport {
            enabled: self.interruption.enabled(),
            threshold: self.interruption.threshold(),
            cooldown_ms: self.interruption.cooldown_ms(),
            stats: self.ledger.stats(),
            has_active_response,
            response_chunks_sent,
        }
    }

    /// Emit the current interruption report to the client.
    pub fn interruption_stats(&self) {
        self.emit(SessionEvent::InterruptionStats(self.interruption_report()));
    }
}
