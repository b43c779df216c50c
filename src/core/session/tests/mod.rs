//! Session tests, organized by concern:
//! - `turn_cycle`: end-of-utterance, replies, history, watchdog and telemetry
//! - `interruption`: barge-in, thresholds, cooldown and the completion race
//! - `early_trigger`: speculative generation from confident partials
//! - `degraded`: collaborator failures that end a turn without a response
//!
//! Shared utilities live in `helpers` and `stubs`.

mod helpers;
mod stubs;
