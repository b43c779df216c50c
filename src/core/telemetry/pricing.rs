use serde::{Deserialize, Serialize};

use super::event::{CostEvent, Stage};

/// Characters per token used when estimating generation usage.
pub const CHARS_PER_TOKEN: f64 = 4.0;

/// Per-stage unit prices in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTable {
    pub transcription_per_audio_minute: f64,
    pub generation_per_million_input_tokens: f64,
    pub generation_per_million_output_tokens: f64,
    pub synthesis_per_million_characters: f64,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            transcription_per_audio_minute: 0.0058,
            generation_per_million_input_tokens: 0.15,
            generation_per_million_output_tokens: 0.60,
            synthesis_per_million_characters: 15.0,
        }
    }
}

impl PricingTable {
    /// Cost of one event. Classification runs locally and is free.
    pub fn price(&self, event: &CostEvent) -> f64 {
        match event.stage {
            Stage::Classification => 0.0,
            Stage::Transcription => {
                event.audio_seconds / 60.0 * self.transcription_per_audio_minute
            }
            Stage::Generation => {
                let input_tokens = event.characters as f64 / CHARS_PER_TOKEN;
                let output_tokens = event.output_characters as f64 / CHARS_PER_TOKEN;
                (input_tokens * self.generation_per_million_input_tokens
                    + output_tokens * self.generation_per_million_output_tokens)
                    / 1_000_000.0
            }
            Stage::Synthesis => {
                event.characters as f64 * self.synthesis_per_million_characters / 1_000_000.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_transcription_priced_per_minute() {
        let table = PricingTable::default();
        let event = CostEvent::new("s", 1, Stage::Transcription).with_audio_seconds(30.0);
        assert!(approx(table.price(&event), 0.0029));
    }

    #[test]
    fn test_generation_uses_token_estimate() {
        let table = PricingTable::default();
        let event = CostEvent::new("s", 1, Stage::Generation)
            .with_characters(4_000_000)
            .with_output_characters(400_000);
        // 1M input tokens + 100k output tokens
        assert!(approx(table.price(&event), 0.15 + 0.06));
    }

    #[test]
    fn test_synthesis_priced_per_character() {
        let table = PricingTable::default();
        let event = CostEvent::new("s", 1, Stage::Synthesis).with_characters(1000);
        assert!(approx(table.price(&event), 0.015));
    }

    #[test]
    fn test_classification_is_free() {
        let table = PricingTable::default();
        let event = CostEvent::new("s", 1, Stage::Classification).with_characters(99);
        assert_eq!(table.price(&event), 0.0);
    }
}
