//! Interruption settings, cooldown and statistics.
//!
//! Settings are runtime-tunable from the client channel, so they live in
//! atomics and can be read on the audio path without locking.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

pub const DEFAULT_INTERRUPTION_THRESHOLD: f32 = 0.7;
pub const DEFAULT_COOLDOWN_MS: u64 = 1000;
pub const MIN_INTERRUPTION_THRESHOLD: f32 = 0.1;
pub const MAX_INTERRUPTION_THRESHOLD: f32 = 1.0;
pub const MIN_COOLDOWN_MS: u64 = 100;
pub const MAX_COOLDOWN_MS: u64 = 5000;

/// Clamp a requested interruption threshold into the accepted range.
pub fn clamp_threshold(threshold: f32) -> f32 {
    if threshold.is_nan() {
        return DEFAULT_INTERRUPTION_THRESHOLD;
    }
    threshold.clamp(MIN_INTERRUPTION_THRESHOLD, MAX_INTERRUPTION_THRESHOLD)
}

/// Clamp a requested cooldown into the accepted range.
pub fn clamp_cooldown_ms(cooldown_ms: u64) -> u64 {
    cooldown_ms.clamp(MIN_COOLDOWN_MS, MAX_COOLDOWN_MS)
}

/// Per-session interruption configuration.
#[derive(Debug)]
pub struct InterruptionSettings {
    enabled: AtomicBool,
    /// f32 bit pattern
    threshold: AtomicU32,
    cooldown_ms: AtomicU64,
}

impl InterruptionSettings {
    pub fn new(enabled: bool, threshold: f32, cooldown_ms: u64) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            threshold: AtomicU32::new(clamp_threshold(threshold).to_bits()),
            cooldown_ms: AtomicU64::new(clamp_cooldown_ms(cooldown_ms)),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn threshold(&self) -> f32 {
        f32::from_bits(self.threshold.load(Ordering::Acquire))
    }

    /// Store a new threshold, returning the clamped value actually applied.
    pub fn set_threshold(&self, threshold: f32) -> f32 {
        let clamped = clamp_threshold(threshold);
        self.threshold.store(clamped.to_bits(), Ordering::Release);
        clamped
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms())
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms.load(Ordering::Acquire)
    }

    /// Store a new cooldown, returning the clamped value actually applied.
    pub fn set_cooldown_ms(&self, cooldown_ms: u64) -> u64 {
        let clamped = clamp_cooldown_ms(cooldown_ms);
        self.cooldown_ms.store(clamped, Ordering::Release);
        clamped
    }
}

impl Default for InterruptionSettings {
    fn default() -> Self {
        Self::new(true, DEFAULT_INTERRUPTION_THRESHOLD, DEFAULT_COOLDOWN_MS)
    }
}

/// Record of one accepted interruption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterruptionEvent {
    /// Monotonic detection time, used for cooldown accounting.
    pub detected_at: Instant,
    /// Wall-clock detection time in milliseconds since the epoch.
    pub detected_at_ms: u64,
    pub confidence: f32,
    pub energy: f32,
    /// Response chunks delivered before the stream was cancelled.
    pub chunks_delivered: usize,
    pub total_chunks: usize,
    /// Time from detection until the response task acknowledged cancellation
    /// (or the acknowledgement wait gave up).
    pub cancellation_latency: Duration,
}

impl InterruptionEvent {
    pub fn latency_ms(&self) -> f64 {
        self.cancellation_latency.as_secs_f64() * 1000.0
    }
}

/// Cooldown bookkeeping and latency statistics for one session.
#[derive(Debug, Default)]
pub struct InterruptionLedger {
    last_detected_at: Option<Instant>,
    count: usize,
    total_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

/// Snapshot of a session's interruption history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterruptionStats {
    pub total_interruptions: usize,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    pub min_latency_ms: f64,
}

impl InterruptionLedger {
    /// True when `now` is at least `cooldown` after the previous interruption.
    ///
    /// The boundary is inclusive: an interruption exactly `cooldown` after the
    /// previous one is accepted.
    pub fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_detected_at {
            Some(previous) => now.saturating_duration_since(previous) >= cooldown,
            None => true,
        }
    }

    /// Start the cooldown window at `detected_at`.
    pub fn mark(&mut self, detected_at: Instant) {
        self.last_detected_at = Some(detected_at);
    }

    pub fn record_latency(&mut self, latency: Duration) {
        let ms = latency.as_secs_f64() * 1000.0;
        if self.count == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.count += 1;
        self.total_ms += ms;
    }

    pub fn last_detected_at(&self) -> Option<Instant> {
        self.last_detected_at
    }

    pub fn stats(&self) -> InterruptionStats {
        if self.count == 0 {
            return InterruptionStats {
                total_interruptions: 0,
                avg_latency_ms: 0.0,
                max_latency_ms: 0.0,
                min_latency_ms: 0.0,
            };
        }

        InterruptionStats {
            total_interruptions: self.count,
            avg_latency_ms: self.total_ms / self.count as f64,
            max_latency_ms: self.max_ms,
            min_latency_ms: self.min_ms,
        }
    }
}
