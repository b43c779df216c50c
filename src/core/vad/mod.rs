//! Voice activity classification.
//!
//! Raw PCM chunks are scored by [`VoiceActivityClassifier`] and the resulting
//! confidence is fed to [`SilenceTracker`] to find utterance boundaries.

pub mod classifier;
pub mod config;
pub mod silence_tracker;

pub use classifier::{SpeechEvent, VoiceActivityClassifier, rms_energy};
pub use config::{ClassifierConfig, ENERGY_HISTORY_LEN};
pub use silence_tracker::{SilenceTracker, SilenceTrackerConfig, VADEvent};
