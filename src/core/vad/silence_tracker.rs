//! End-of-utterance detection from classifier confidence.
//!
//! `SilenceTracker` consumes the per-chunk confidence produced by the
//! [`VoiceActivityClassifier`](super::VoiceActivityClassifier) together with
//! the duration of audio each chunk carried, and reports the transitions the
//! turn state machine cares about.
//!
//! # State Transitions
//!
//! ```text
//! [Initial] ─── confidence > threshold ──► [Speaking]      (SpeechStart)
//!     │
//!     └── confidence <= threshold ──► (no event)
//!
//! [Speaking] ─── confidence <= threshold ──► [Silence]     (SilenceDetected)
//!     ▲                                          │
//!     └───── confidence > threshold ─────────────┘         (SpeechResumed)
//!
//! [Silence] ─── silence >= silence_duration_ms ──► [Turn End] (TurnEnd, once)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// Event emitted by the silence tracker during state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VADEvent {
    /// First speech chunk of a new utterance.
    SpeechStart,

    /// Speech gave way to silence after enough speech was heard.
    ///
    /// Not yet a turn end; the speaker may only be pausing.
    SilenceDetected,

    /// Speech came back before the silence window elapsed.
    SpeechResumed,

    /// Continuous silence reached `silence_duration_ms` after at least
    /// `min_speech_duration_ms` of speech. Fires once per silence period.
    TurnEnd,
}

/// Configuration for silence tracking.
#[derive(Debug, Clone, Copy)]
pub struct SilenceTrackerConfig {
    /// Confidence above which a chunk is treated as speech. Default: 0.5.
    pub threshold: f32,

    /// Continuous silence required to end a turn (ms). Default: 500.
    pub silence_duration_ms: u64,

    /// Speech required before a silence can end the turn (ms). Default: 250.
    pub min_speech_duration_ms: u64,
}

impl Default for SilenceTrackerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            silence_duration_ms: 500,
            min_speech_duration_ms: 250,
        }
    }
}

impl SilenceTrackerConfig {
    pub fn with_silence_duration_ms(mut self, duration_ms: u64) -> Self {
        self.silence_duration_ms = duration_ms;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_speech_duration_ms(mut self, duration_ms: u64) -> Self {
        self.min_speech_duration_ms = duration_ms;
        self
    }
}

/// Tracks speech and silence durations for one session.
///
/// All fields are atomics so the tracker can be read from status endpoints
/// while the receive loop keeps feeding it.
pub struct SilenceTracker {
    config: SilenceTrackerConfig,

    is_speaking: AtomicBool,

    /// Accumulated speech in the current utterance (ms).
    speech_duration_ms: AtomicU64,

    /// Continuous silence since the last speech chunk (ms).
    silence_duration_ms: AtomicU64,

    /// Latch preventing duplicate TurnEnd events for one silence period.
    turn_end_fired: AtomicBool,
}

impl SilenceTracker {
    pub fn new(config: SilenceTrackerConfig) -> Self {
        Self {
            config,
            is_speaking: AtomicBool::new(false),
            speech_duration_ms: AtomicU64::new(0),
            silence_duration_ms: AtomicU64::new(0),
            turn_end_fired: AtomicBool::new(false),
        }
    }

    /// Process one classified chunk and return any triggered event.
    pub fn process_chunk(&self, confidence: f32, duration_ms: u64) -> Option<VADEvent> {
        let is_speech = confidence > self.config.threshold;
        let was_speaking = self.is_speaking.load(Ordering::Acquire);

        if is_speech {
            self.process_speech_chunk(was_speaking, duration_ms)
        } else {
            self.process_silence_chunk(was_speaking, duration_ms)
        }
    }

    fn process_speech_chunk(&self, was_speaking: bool, duration_ms: u64) -> Option<VADEvent> {
        let speech_before = self
            .speech_duration_ms
            .fetch_add(duration_ms, Ordering::AcqRel);
        self.is_speaking.store(true, Ordering::Release);
        self.turn_end_fired.store(false, Ordering::Release);

        let silence_before = self.silence_duration_ms.swap(0, Ordering::AcqRel);

        if was_speaking {
            return None;
        }

        if speech_before == 0 {
            debug!("VAD: speech started");
            return Some(VADEvent::SpeechStart);
        }

        debug!("VAD: speech resumed after {}ms silence", silence_before);
        Some(VADEvent::SpeechResumed)
    }

    fn process_silence_chunk(&self, was_speaking: bool, duration_ms: u64) -> Option<VADEvent> {
        let new_silence = self
            .silence_duration_ms
            .fetch_add(duration_ms, Ordering::AcqRel)
            + duration_ms;

        if was_speaking {
            self.is_speaking.store(false, Ordering::Release);

            let speech_duration = self.speech_duration_ms.load(Ordering::Acquire);
            if speech_duration < self.config.min_speech_duration_ms {
                debug!(
                    "VAD: ignoring silence (speech_duration={}ms < min={}ms)",
                    speech_duration, self.config.min_speech_duration_ms
                );
                return None;
            }

            debug!("VAD: silence detected after {}ms of speech", speech_duration);
            return Some(VADEvent::SilenceDetected);
        }

        self.check_turn_end(new_silence)
    }

    fn check_turn_end(&self, new_silence: u64) -> Option<VADEvent> {
        if self.turn_end_fired.load(Ordering::Acquire)
            || new_silence < self.config.silence_duration_ms
        {
            return None;
        }

        let speech_duration = self.speech_duration_ms.load(Ordering::Acquire);
        if speech_duration < self.config.min_speech_duration_ms {
            return None;
        }

        self.turn_end_fired.store(true, Ordering::Release);
        info!(
            "VAD: turn end after {}ms silence (speech_duration={}ms)",
            new_silence, speech_duration
        );
        Some(VADEvent::TurnEnd)
    }

    /// True when enough speech was heard and the speaker is currently silent.
    ///
    /// Used to corroborate an utterance-end hint coming from the
    /// transcription side before acting on it.
    pub fn in_silence_gap(&self) -> bool {
        !self.is_speaking()
            && self.current_silence_ms() > 0
            && self.current_speech_ms() >= self.config.min_speech_duration_ms
    }

    /// True when the speech heard so far was too short to count as an
    /// utterance and a full silence window has passed since.
    pub fn is_false_start(&self) -> bool {
        let speech_ms = self.current_speech_ms();
        !self.is_speaking()
            && speech_ms > 0
            && speech_ms < self.config.min_speech_duration_ms
            && self.current_silence_ms() >= self.config.silence_duration_ms
    }

    /// Clear all accumulated state. Called at the start of every LISTENING period.
    pub fn reset(&self) {
        self.is_speaking.store(false, Ordering::Release);
        self.speech_duration_ms.store(0, Ordering::Release);
        self.silence_duration_ms.store(0, Ordering::Release);
        self.turn_end_fired.store(false, Ordering::Release);
        debug!("SilenceTracker state reset");
    }

    pub fn current_silence_ms(&self) -> u64 {
        self.silence_duration_ms.load(Ordering::Acquire)
    }

    pub fn current_speech_ms(&self) -> u64 {
        self.speech_duration_ms.load(Ordering::Acquire)
    }

    pub fn is_speaking(&self) -> bool {
        self.is_speaking.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SilenceTrackerConfig {
        &self.config
    }
}

impl Default for SilenceTracker {
    fn default() -> Self {
        Self::new(SilenceTrackerConfig::default())
    }
}
