//! Shared harness for driving a session with synthetic audio.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::stubs::{GatedSynth, ScriptedTranscriber};
use crate::core::llm::ReplyGenerator;
use crate::core::session::{Session, SessionConfig, SessionEvent, SessionInputs, SessionServices};
use crate::core::stt::TranscriptCoordinator;
use crate::core::telemetry::{TelemetryConfig, TelemetrySink};
use crate::core::tts::ResponseStreamer;
use crate::core::turn::ConversationState;
use crate::core::vad::SpeechEvent;

/// 100ms of 16kHz PCM16 at a constant amplitude.
pub fn chunk_with_amplitude(amplitude: i16) -> Vec<u8> {
    (0..1600)
        .flat_map(|i| {
            let sample = if i % 2 == 0 { amplitude } else { -amplitude };
            sample.to_le_bytes()
        })
        .collect()
}

pub fn loud_chunk() -> Vec<u8> {
    chunk_with_amplitude(8000)
}

/// Speech that is clearly above the energy threshold but scores about 0.88.
pub fn soft_chunk() -> Vec<u8> {
    chunk_with_amplitude(600)
}

pub fn silent_chunk() -> Vec<u8> {
    vec![0u8; 3200]
}

pub struct Harness {
    pub session: Session,
    pub inputs: SessionInputs,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    /// Every event received so far, in order.
    pub seen: Vec<SessionEvent>,
    pub telemetry: TelemetrySink,
    pub telemetry_task: Option<JoinHandle<()>>,
}

impl Harness {
    pub fn new(
        transcriber: Arc<ScriptedTranscriber>,
        synth: Arc<GatedSynth>,
        generator: Option<Arc<dyn ReplyGenerator>>,
        config: SessionConfig,
    ) -> Self {
        let (telemetry, telemetry_task) = TelemetrySink::from_config(&TelemetryConfig::default());
        let services = SessionServices {
            transcripts: TranscriptCoordinator::new(transcriber, config.transcript.clone()),
            streamer: ResponseStreamer::new(synth, config.max_chunk_chars)
                .with_telemetry(telemetry.clone()),
            generator,
            telemetry: telemetry.clone(),
        };
        let (events_tx, events) = mpsc::unbounded_channel();
        let (session, inputs) = Session::new("test-session", config, services, events_tx);

        Self {
            session,
            inputs,
            events,
            seen: Vec::new(),
            telemetry,
            telemetry_task: Some(telemetry_task),
        }
    }

    pub async fn send(&mut self, chunk: &[u8]) -> SpeechEvent {
        self.session.handle_audio(chunk).await
    }

    pub async fn send_n(&mut self, chunk: &[u8], count: usize) -> Vec<SpeechEvent> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.send(chunk).await);
        }
        out
    }

    /// One second of speech followed by enough silence to end the turn.
    pub async fn speak_utterance(&mut self) {
        self.send_n(&loud_chunk(), 10).await;
        self.send_n(&silent_chunk(), 5).await;
    }

    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
    }

    /// Apply session signals until `done` holds, panicking after two seconds.
    pub async fn pump_until(&mut self, done: impl Fn(&Session, &[SessionEvent]) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            self.drain_events();
            if done(&self.session, &self.seen) {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "condition not reached; state {:?}, events {:?}",
                self.session.state(),
                self.labels()
            );
            if let Ok(Some(signal)) =
                tokio::time::timeout(Duration::from_millis(5), self.inputs.next()).await
            {
                self.session.handle_signal(signal).await;
            }
        }
    }

    pub async fn wait_for_state(&mut self, state: ConversationState) {
        self.pump_until(|session, _| session.state() == state).await;
    }

    /// Apply whatever signals arrive within `window`.
    pub async fn pump_for(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        while Instant::now() < deadline {
            if let Ok(Some(signal)) =
                tokio::time::timeout(Duration::from_millis(5), self.inputs.next()).await
            {
                self.session.handle_signal(signal).await;
            }
        }
        self.drain_events();
    }

    /// Compact event log, without the high-volume or timing-dependent events.
    pub fn labels(&self) -> Vec<String> {
        self.seen.iter().filter_map(label).collect()
    }

    pub fn count(&self, matches: impl Fn(&SessionEvent) -> bool) -> usize {
        self.seen.iter().filter(|e| matches(e)).count()
    }

    /// Stop the telemetry consumer so its aggregates are final.
    pub async fn flush_telemetry(&mut self) {
        self.telemetry.shutdown();
        if let Some(task) = self.telemetry_task.take() {
            task.await.unwrap();
        }
    }
}

fn label(event: &SessionEvent) -> Option<String> {
    let label = match event {
        SessionEvent::StateChanged { from, to, .. } => format!("state {from}->{to}"),
        SessionEvent::TranscriptFinal { text, .. } => format!("final '{text}'"),
        SessionEvent::DegradedTurn { .. } => "degraded_turn".to_string(),
        SessionEvent::ResponseStarted { total_chunks, .. } => {
            format!("response_started {total_chunks}")
        }
        SessionEvent::AudioChunk { sequence, .. } => format!("audio {sequence}"),
        SessionEvent::ResponseComplete { chunks_sent, .. } => {
            format!("response_complete {chunks_sent}")
        }
        SessionEvent::InterruptionDetected(_) => "interruption".to_string(),
        SessionEvent::ResponseInterrupted { chunks_sent, .. } => {
            format!("response_interrupted {chunks_sent}")
        }
        SessionEvent::Error { .. } => "error".to_string(),
        _ => return None,
    };
    Some(label)
}
