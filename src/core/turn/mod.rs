//! Turn-taking primitives shared by the session engine.

pub mod interruption;
pub mod state;

pub use interruption::{
    DEFAULT_COOLDOWN_MS, DEFAULT_INTERRUPTION_THRESHOLD, InterruptionEvent, InterruptionLedger,
    InterruptionSettings, InterruptionStats, clamp_cooldown_ms, clamp_threshold,
};
pub use state::{ConversationState, StateCell};
