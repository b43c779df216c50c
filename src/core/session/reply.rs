//! Reply generation and the response stream that speaks it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::llm::{DialogueLine, ReplyError};
use crate::core::telemetry::{CostEvent, Stage};
use crate::core::tts::{ResponseChunk, ResponseSink, StreamStatus};
use crate::core::turn::ConversationState;

use super::{Generation, Session, SessionError, SessionEvent, SessionResult, SessionSignal};

/// Forwards stream output into the session's channels.
struct ClientSink {
    events: mpsc::UnboundedSender<SessionEvent>,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

impl ResponseSink for ClientSink {
    fn deliver(&self, chunk: ResponseChunk) {
        let _ = self.events.send(SessionEvent::AudioChunk {
            turn: chunk.turn,
            sequence: chunk.sequence,
            total_chunks: chunk.total_chunks,
            text: chunk.text,
            audio: chunk.audio,
        });
    }

    fn completed(&self, turn: u64, chunks_sent: usize, total_chunks: usize) {
        let _ = self.signals.send(SessionSignal::ResponseFinished {
            turn,
            chunks_sent,
            total_chunks,
        });
    }
}

/// Case and whitespace insensitive comparison key.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl Session {
    /// Spawn the generator on `text`. Its result comes back as
    /// [`SessionSignal::ReplyReady`].
    pub(crate) fn start_generation(&mut self, text: String, speculative: bool) {
        let Some(generator) = self.services.generator.clone() else {
            return;
        };

        self.next_generation_id += 1;
        let generation_id = self.next_generation_id;
        let history: Vec<DialogueLine> = self.history.iter().cloned().collect();
        let timeout = self.config.reply_timeout;
        let signals = self.signals.clone();
        let source_text = text.clone();

        debug!(
            session_id = %self.id,
            generation_id,
            speculative,
            generator = generator.name(),
            "Starting reply generation"
        );

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let result =
                match tokio::time::timeout(timeout, generator.generate(&source_text, &history))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ReplyError::Timeout),
                };
            let _ = signals.send(SessionSignal::ReplyReady {
                generation_id,
                source_text,
                result,
                elapsed: started.elapsed(),
            });
        });

        self.generation = Some(Generation {
            id: generation_id,
            source_text: text,
            speculative,
            task,
            result: None,
        });
    }

    /// Reuse a speculative generation whose partial matches the final
    /// transcript, otherwise generate from the final text.
    pub(crate) fn adopt_or_generate(&mut self, text: &str) {
        if self.services.generator.is_none() {
            debug!(session_id = %self.id, "No reply generator, waiting for client reply");
            return;
        }

        if let Some(generation) = self.generation.as_mut()
            && generation.speculative
            && normalize(&generation.source_text) == normalize(text)
        {
            info!(
                session_id = %self.id,
                generation_id = generation.id,
                "Reusing early-triggered reply generation"
            );
            generation.speculative = false;
            if let Some(result) = generation.result.take() {
                self.generation = None;
                self.finish_generation(result);
            }
            return;
        }

        self.generation = None;
        self.start_generation(text.to_string(), false);
    }

    pub(crate) fn on_reply_ready(
        &mut self,
        generation_id: u64,
        source_text: String,
        result: Result<String, ReplyError>,
        elapsed: Duration,
    ) {
        let output_characters = result.as_ref().map(|r| r.chars().count()).unwrap_or(0);
        self.services.telemetry.record(
            CostEvent::new(self.id.as_str(), self.turn(), Stage::Generation)
                .with_duration(elapsed)
                .with_characters(source_text.chars().count())
                .with_output_characters(output_characters),
        );

        let Some(generation) = self.generation.as_mut().filter(|g| g.id == generation_id) else {
            debug!(session_id = %self.id, generation_id, "Discarding stale reply");
            return;
        };

        if generation.speculative {
            generation.result = Some(result);
            return;
        }

        self.generation = None;
        self.finish_generation(result);
    }

    fn finish_generation(&mut self, result: Result<String, ReplyError>) {
        if self.state() != ConversationState::Processing {
            return;
        }
        match result {
            Ok(text) if !text.trim().is_empty() => self.start_response(text),
            Ok(_) => self.degrade_turn(ReplyError::EmptyReply.to_string()),
            Err(e) => self.degrade_turn(format!("reply generation failed: {e}")),
        }
    }

    /// Speak a reply supplied by the client. Only valid in PROCESSING.
    pub fn handle_client_reply(&mut self, text: &str) -> SessionResult<()> {
        let state = self.state();
        if state != ConversationState::Processing {
            return Err(SessionError::NotProcessing(state));
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyReply);
        }

        self.generation = None;
        self.start_response(text.to_string());
        Ok(())
    }

    /// PROCESSING -> RESPONDING and start streaming `text`.
    fn start_response(&mut self, text: String) {
        let chunks = self.services.streamer.split(&text);
        let total_chunks = chunks.len();
        let turn = self.turn();

        if !self.transition(ConversationState::Processing, ConversationState::Responding) {
            return;
        }
        self.emit(SessionEvent::ResponseStarted { turn, total_chunks });

        let sink = Arc::new(ClientSink {
            events: self.events.clone(),
            signals: self.signals.clone(),
        });
        self.response = Some(self.services.streamer.start_chunks(
            &self.id,
            turn,
            chunks,
            &self.voice,
            sink,
        ));
    }

    pub(crate) fn on_response_finished(
        &mut self,
        turn: u64,
        chunks_sent: usize,
        total_chunks: usize,
    ) {
        let Some(response) = self.response.as_ref() else {
            return;
        };
        let stream = response.stream().clone();
        if stream.turn() != turn || stream.status() != StreamStatus::Completed {
            return;
        }

        info!(
            session_id = %self.id,
            turn,
            chunks_sent,
            total_chunks,
            "Response complete"
        );
        self.emit(SessionEvent::ResponseComplete {
            turn,
            chunks_sent,
            total_chunks,
        });
        self.push_history(DialogueLine::assistant(stream.chunks().join(" ")));
        self.response = None;
        self.transition(ConversationState::Responding, ConversationState::Listening);
    }
}
