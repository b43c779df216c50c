use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::llm::{OpenAIReplyGenerator, ReplyGenerator};
use crate::core::session::{SessionConfig, SessionRegistry, SessionServices};
use crate::core::stt::{DeepgramSTT, TranscriptCoordinator, TranscriptionProvider};
use crate::core::telemetry::TelemetrySink;
use crate::core::tts::{DeepgramTTS, ResponseStreamer, SynthesisProvider};

/// Application state that can be shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    /// Engine settings every new session starts from
    pub session_config: SessionConfig,
    /// Live sessions, registered by their connection for the lifetime of the socket
    pub sessions: Arc<SessionRegistry>,
    /// Collaborators shared by every session
    pub services: SessionServices,
    pub telemetry: TelemetrySink,
    telemetry_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Build the state with the Deepgram and OpenAI collaborators named in
    /// `config`.
    ///
    /// A Deepgram key is required. Without an OpenAI key sessions wait for
    /// the client's `reply` message instead of generating one.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let transcriber: Arc<dyn TranscriptionProvider> =
            Arc::new(DeepgramSTT::new(config.deepgram_stt_config()?)?);
        let synthesizer: Arc<dyn SynthesisProvider> =
            Arc::new(DeepgramTTS::new(config.tts_config()?)?);

        let generator: Option<Arc<dyn ReplyGenerator>> = match config.openai_config() {
            Some(openai) => {
                info!("Reply generation via {} ({})", openai.base_url, openai.model);
                Some(Arc::new(OpenAIReplyGenerator::new(openai)?))
            }
            None => {
                warn!("OPENAI_API_KEY not set; replies must be supplied by the client");
                None
            }
        };

        Ok(Self::with_collaborators(
            config,
            transcriber,
            synthesizer,
            generator,
        ))
    }

    /// Build the state around caller-supplied collaborators.
    ///
    /// Spawns the telemetry consumer, so it must run inside a Tokio runtime.
    pub fn with_collaborators(
        config: ServerConfig,
        transcriber: Arc<dyn TranscriptionProvider>,
        synthesizer: Arc<dyn SynthesisProvider>,
        generator: Option<Arc<dyn ReplyGenerator>>,
    ) -> Arc<Self> {
        let session_config = config.session_config();
        let (telemetry, telemetry_task) = TelemetrySink::from_config(&config.telemetry_config());

        info!(
            "Collaborators: transcription={}, synthesis={}, generation={}",
            transcriber.name(),
            synthesizer.name(),
            generator.as_ref().map_or("client", |g| g.name())
        );

        let services = SessionServices {
            transcripts: TranscriptCoordinator::new(transcriber, session_config.transcript.clone()),
            streamer: ResponseStreamer::new(synthesizer, session_config.max_chunk_chars)
                .with_telemetry(telemetry.clone()),
            generator,
            telemetry: telemetry.clone(),
        };

        Arc::new(Self {
            config,
            session_config,
            sessions: Arc::new(SessionRegistry::new()),
            services,
            telemetry,
            telemetry_task: Mutex::new(Some(telemetry_task)),
        })
    }

    /// Close the telemetry queue and wait for the consumer to drain it.
    pub async fn shutdown(&self) {
        self.telemetry.shutdown();
        let task = self.telemetry_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!("Telemetry consumer ended abnormally: {}", e);
        }
    }
}
