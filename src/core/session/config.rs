//! Configuration types for a dialogue session

use std::time::Duration;

use crate::core::stt::CoordinatorConfig;
use crate::core::tts::DEFAULT_MAX_CHUNK_CHARS;
use crate::core::turn::{DEFAULT_COOLDOWN_MS, DEFAULT_INTERRUPTION_THRESHOLD};
use crate::core::vad::{ClassifierConfig, SilenceTrackerConfig};

/// Defaults for a session's interruption behavior. Each session copies these
/// and the client may tune its own copy at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterruptionDefaults {
    pub enabled: bool,
    /// Minimum VAC confidence for sustained speech to interrupt. Default: 0.7
    pub threshold: f32,
    /// Minimum spacing between two interruptions (ms). Default: 1000
    pub cooldown_ms: u64,
}

impl Default for InterruptionDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_INTERRUPTION_THRESHOLD,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

/// Configuration for one dialogue session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub classifier: ClassifierConfig,
    pub silence: SilenceTrackerConfig,
    pub transcript: CoordinatorConfig,
    pub interruption: InterruptionDefaults,
    /// Audio kept before speech starts and replayed into the transcript (ms). Default: 500
    pub pre_roll_ms: u64,
    /// Upper bound on waiting for a cancelled response task to exit. Default: 40ms
    pub cancel_ack_timeout: Duration,
    /// Longest a session may stay outside LISTENING without progress. Default: 15s
    pub max_state_duration: Duration,
    /// Upper bound on one reply generation call. Default: 12s
    pub reply_timeout: Duration,
    pub max_chunk_chars: usize,
    /// Voice requested from the synthesizer; provider default when `None`
    pub voice: Option<String>,
    /// Dialogue lines kept as generation context. Default: 10
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            silence: SilenceTrackerConfig::default(),
            transcript: CoordinatorConfig::default(),
            interruption: InterruptionDefaults::default(),
            pre_roll_ms: 500,
            cancel_ack_timeout: Duration::from_millis(40),
            max_state_duration: Duration::from_secs(15),
            reply_timeout: Duration::from_secs(12),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            voice: None,
            history_limit: 10,
        }
    }
}

impl SessionConfig {
    pub fn with_interruption(mut self, interruption: InterruptionDefaults) -> Self {
        self.interruption = interruption;
        self
    }

    pub fn with_cancel_ack_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_ack_timeout = timeout;
        self
    }

    pub fn with_max_state_duration(mut self, duration: Duration) -> Self {
        self.max_state_duration = duration;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}
