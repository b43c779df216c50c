//! Configuration for the energy-based voice activity classifier.
//!
//! The classifier works on raw 16-bit little-endian mono PCM. It has no model to
//! load; every knob here is a plain threshold or window size that operators tune
//! for their microphones and rooms.

use serde::{Deserialize, Serialize};

/// Number of recent chunk energies kept by the classifier.
pub const ENERGY_HISTORY_LEN: usize = 10;

/// Configuration for [`VoiceActivityClassifier`](super::VoiceActivityClassifier).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// RMS energy above which a chunk counts as "loud".
    ///
    /// Measured on raw i16 samples, so typical speech lands somewhere between
    /// 300 and 3000. Default: 500.0.
    pub energy_threshold: f32,

    /// Consecutive above-threshold chunks required before speech is flagged
    /// as sustained. Also the width of the confidence window. Default: 3.
    pub min_sustained_chunks: usize,

    /// Sample rate of the incoming PCM, used to derive chunk durations.
    /// Default: 16000.
    pub sample_rate: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 500.0,
            min_sustained_chunks: 3,
            sample_rate: 16000,
        }
    }
}

impl ClassifierConfig {
    pub fn with_energy_threshold(mut self, threshold: f32) -> Self {
        self.energy_threshold = threshold;
        self
    }

    pub fn with_min_sustained_chunks(mut self, chunks: usize) -> Self {
        self.min_sustained_chunks = chunks.clamp(1, ENERGY_HISTORY_LEN);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Duration in milliseconds of a PCM16 mono chunk of `byte_len` bytes.
    pub fn chunk_duration_ms(&self, byte_len: usize) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        let samples = (byte_len / 2) as u64;
        samples * 1000 / self.sample_rate as u64
    }
}
