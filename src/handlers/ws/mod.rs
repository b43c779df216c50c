//! # WebSocket Dialogue Handler Module
//!
//! Each connection to `/ws` gets its own dialogue [`Session`](crate::core::Session).
//! The client streams microphone audio in and receives the engine's events
//! and synthesized reply audio back.
//!
//! ## WebSocket API
//!
//! ### Connection Flow
//! 1. Client connects to the `/ws` endpoint
//! 2. Server answers with `connected` carrying the session id
//! 3. Client streams binary PCM16 mono audio at the configured sample rate
//! 4. Server reports speech, transcripts and state changes as they happen
//! 5. When the user stops talking the reply is generated (or supplied by the
//!    client with `reply`) and streamed back as `audio_chunk` messages
//! 6. Sustained user speech during a response interrupts it
//!
//! ### Message Types
//!
//! **Incoming Messages:**
//! - **Binary messages** - Raw PCM16 little-endian mono audio
//! - `{"type": "reply", "text": "..."}` - Reply text for the current turn (only while processing)
//! - `{"type": "configure_interruption", "threshold": 0.7, "cooldown_ms": 1000}` - Both fields optional
//! - `{"type": "enable_interruption", "enabled": false}`
//! - `{"type": "get_interruption_stats"}`
//! - `{"type": "ping"}`
//!
//! **Outgoing Messages:**
//! - `{"type": "connected", "session_id": "..."}`
//! - `{"type": "state_changed", "from": "listening", "to": "processing", "turn": 1}`
//! - `{"type": "speech_detected", "confidence": 1.0, "energy": 8000.0, "conversation_state": "listening"}`
//! - `{"type": "transcript_partial", "text": "...", "confidence": 0.6}`
//! - `{"type": "early_trigger", "text": "...", "confidence": 0.85}`
//! - `{"type": "transcript_final", "text": "...", "confidence": 0.95, "degraded": false}`
//! - `{"type": "degraded_mode", "reason": "..."}` - Streaming transcription failed, single-shot fallback in use
//! - `{"type": "degraded_turn", "reason": "..."}` - The turn was abandoned, session is listening again
//! - `{"type": "response_started", "turn": 1, "total_chunks": 2}`
//! - `{"type": "audio_chunk", "turn": 1, "sequence": 0, "total_chunks": 2, "text": "...", "payload": "<base64>", "format": "linear16", "sample_rate": 24000}`
//! - `{"type": "response_complete", "turn": 1, "chunks_sent": 2, "total_chunks": 2}`
//! - `{"type": "interruption_detected", "confidence": 1.0, "chunks_interrupted": 1, "latency_ms": 2.4, ...}`
//! - `{"type": "response_interrupted", "turn": 1, "chunks_sent": 1, "total_chunks": 2}`
//! - `{"type": "interruption_configured", "enabled": true, "threshold": 0.7, "cooldown_ms": 1000}`
//! - `{"type": "interruption_toggled", "enabled": false}`
//! - `{"type": "interruption_stats", "enabled": true, "threshold": 0.7, "total_interruptions": 1, ...}`
//! - `{"type": "pong", "timestamp": 1234567890}`
//! - `{"type": "error", "message": "error description"}`
//!
//! ## Rust Client Example
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (ws_stream, _) = connect_async("ws://localhost:3001/ws").await?;
//!     let (mut write, mut read) = ws_stream.split();
//!
//!     // 100ms of 16kHz audio
//!     write.send(Message::Binary(vec![0u8; 3200].into())).await?;
//!
//!     while let Some(message) = read.next().await {
//!         if let Message::Text(text) = message? {
//!             let parsed: serde_json::Value = serde_json::from_str(&text)?;
//!             println!("{}: {}", parsed["type"], parsed);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Malformed messages and rejected requests produce an `error` message; the
//! connection stays open. Malformed audio is scored as silence.

pub mod error;
pub mod handler;
pub mod messages;
pub mod processor;

// Re-export commonly used items
pub use error::{WebSocketError, WebSocketResult};
pub use handler::ws_voice_handler;
pub use messages::{IncomingMessage, MessageRoute, OutgoingMessage};
