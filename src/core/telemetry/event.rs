use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage a cost event is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classification,
    Transcription,
    Generation,
    Synthesis,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Classification,
        Stage::Transcription,
        Stage::Generation,
        Stage::Synthesis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Classification => "classification",
            Stage::Transcription => "transcription",
            Stage::Generation => "generation",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work performed for a turn, recorded once and never read back
/// by the voice path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEvent {
    pub session_id: String,
    pub turn: u64,
    pub stage: Stage,
    pub duration_ms: u64,
    /// Input characters (transcript for generation, chunk text for synthesis)
    #[serde(default)]
    pub characters: u64,
    /// Output characters, only meaningful for generation
    #[serde(default)]
    pub output_characters: u64,
    #[serde(default)]
    pub audio_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl CostEvent {
    pub fn new(session_id: impl Into<String>, turn: u64, stage: Stage) -> Self {
        Self {
            session_id: session_id.into(),
            turn,
            stage,
            duration_ms: 0,
            characters: 0,
            output_characters: 0,
            audio_seconds: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_characters(mut self, characters: usize) -> Self {
        self.characters = characters as u64;
        self
    }

    pub fn with_output_characters(mut self, characters: usize) -> Self {
        self.output_characters = characters as u64;
        self
    }

    pub fn with_audio_seconds(mut self, seconds: f64) -> Self {
        self.audio_seconds = seconds.max(0.0);
        self
    }
}

/// A cost event after pricing, as handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    #[serde(flatten)]
    pub event: CostEvent,
    pub cost_usd: f64,
}
