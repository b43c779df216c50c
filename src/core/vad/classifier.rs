//! Energy-based voice activity classification.
//!
//! Every inbound PCM chunk is scored here, in every conversation state. The
//! classifier keeps a short rolling window of chunk energies so that a single
//! loud click does not register as speech:
//!
//! ```text
//! chunk ──► RMS energy ──► level = min(1, energy / (2 * threshold))
//!                │
//!                └──► history (last 10 chunks)
//!                         │
//!                         └──► confidence over the last `min_sustained_chunks`
//!                              = 0.7 * fraction_above + 0.3 * mean(level)
//! ```
//!
//! A chunk that is itself below threshold is scored `0.3 * level` regardless of
//! the window, so confidence falls immediately when the speaker stops.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

use super::config::{ClassifierConfig, ENERGY_HISTORY_LEN};

/// Classification result for one audio chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechEvent {
    /// Monotonic time the chunk was classified.
    pub timestamp: Instant,
    /// Speech confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    /// RMS energy of the chunk.
    pub energy: f32,
    /// True once `min_sustained_chunks` consecutive chunks were above threshold.
    pub is_sustained: bool,
    /// Duration of audio carried by the chunk.
    pub duration_ms: u64,
}

impl SpeechEvent {
    fn silent(duration_ms: u64) -> Self {
        Self {
            timestamp: Instant::now(),
            confidence: 0.0,
            energy: 0.0,
            is_sustained: false,
            duration_ms,
        }
    }
}

/// Root-mean-square energy of 16-bit little-endian PCM.
///
/// A trailing odd byte is ignored. Empty input has zero energy.
pub fn rms_energy(audio: &[u8]) -> f32 {
    let mut sum_squares = 0f64;
    let mut count = 0usize;
    for pair in audio.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64;
        sum_squares += sample * sample;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum_squares / count as f64).sqrt() as f32
}

/// Stateful voice activity classifier owned by a single session.
#[derive(Debug)]
pub struct VoiceActivityClassifier {
    config: ClassifierConfig,
    history: VecDeque<f32>,
}

impl VoiceActivityClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(ENERGY_HISTORY_LEN),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Score one chunk of PCM audio.
    ///
    /// Never fails: an empty chunk or one holding less than a single sample
    /// produces a zero-confidence event and pushes zero energy into the window.
    pub fn classify(&mut self, chunk: &[u8]) -> SpeechEvent {
        let duration_ms = self.config.chunk_duration_ms(chunk.len());

        if chunk.len() < 2 {
            self.push_energy(0.0);
            return SpeechEvent::silent(duration_ms);
        }

        let energy = rms_energy(chunk);
        self.push_energy(energy);

        let window = self.config.min_sustained_chunks.max(1);
        let threshold = self.config.energy_threshold;

        let confidence = if energy < threshold {
            0.3 * self.level(energy)
        } else {
            // Missing slots at session start count as silence.
            let mut above = 0usize;
            let mut level_sum = 0f32;
            for &e in self.history.iter().rev().take(window) {
                if e >= threshold {
                    above += 1;
                }
                level_sum += self.level(e);
            }
            let fraction_above = above as f32 / window as f32;
            let mean_level = level_sum / window as f32;
            0.7 * fraction_above + 0.3 * mean_level
        };

        let is_sustained = self.history.len() >= window
            && self
                .history
                .iter()
                .rev()
                .take(window)
                .all(|&e| e >= threshold);

        debug!(
            energy = energy,
            confidence = confidence,
            sustained = is_sustained,
            "VAC chunk classified"
        );

        SpeechEvent {
            timestamp: Instant::now(),
            confidence: confidence.clamp(0.0, 1.0),
            energy,
            is_sustained,
            duration_ms,
        }
    }

    /// Clear the rolling energy window.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Energies currently held in the window, oldest first.
    pub fn energy_history(&self) -> impl Iterator<Item = &f32> {
        self.history.iter()
    }

    fn level(&self, energy: f32) -> f32 {
        let threshold = self.config.energy_threshold;
        if threshold <= 0.0 {
            return 1.0;
        }
        (energy / (2.0 * threshold)).min(1.0)
    }

    fn push_energy(&mut self, energy: f32) {
        if self.history.len() == ENERGY_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(energy);
    }
}

impl Default for VoiceActivityClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
