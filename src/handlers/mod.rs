//! HTTP and WebSocket request handlers
//!
//! - `api` - Health, live sessions and telemetry endpoints
//! - `ws` - WebSocket real-time dialogue sessions

pub mod api;
pub mod ws;

// Re-export commonly used handlers for convenient access
pub use ws::ws_voice_handler;
