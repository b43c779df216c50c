//! WebSocket message processing
//!
//! Routes parsed client messages to the connection's session.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::session::Session;

use super::{
    error::{WebSocketError, WebSocketResult},
    messages::{IncomingMessage, MessageRoute, OutgoingMessage},
};

/// Process incoming WebSocket message based on its type
///
/// Session state changes are reported through the session's own event
/// channel; only direct answers (`pong`, errors) go through `message_tx`.
///
/// # Returns
/// * `bool` - true to continue processing, false to terminate the connection
pub async fn handle_incoming_message(
    msg: IncomingMessage,
    session: &mut Session,
    message_tx: &mpsc::Sender<MessageRoute>,
) -> bool {
    if let Err(e) = apply_message(msg, session, message_tx).await {
        warn!(session_id = %session.id(), "Client request rejected: {}", e);
        let _ = message_tx
            .send(MessageRoute::Outgoing(OutgoingMessage::Error {
                message: e.to_message(),
            }))
            .await;
    }
    true
}

async fn apply_message(
    msg: IncomingMessage,
    session: &mut Session,
    message_tx: &mpsc::Sender<MessageRoute>,
) -> WebSocketResult<()> {
    match msg {
        IncomingMessage::Reply { text } => {
            debug!(session_id = %session.id(), "Client reply: {} chars", text.len());
            session.handle_client_reply(&text)?;
        }
        IncomingMessage::ConfigureInterruption {
            threshold,
            cooldown_ms,
        } => session.configure_interruption(threshold, cooldown_ms),
        IncomingMessage::EnableInterruption { enabled } => session.enable_interruption(enabled),
        IncomingMessage::GetInterruptionStats => session.interruption_stats(),
        IncomingMessage::Ping => {
            let _ = message_tx
                .send(MessageRoute::Outgoing(OutgoingMessage::Pong {
                    timestamp: chrono::Utc::now().timestamp_millis(),
                }))
                .await;
        }
    }
    Ok(())
}

/// Parse a text frame into an [`IncomingMessage`].
pub fn parse_message(text: &str) -> WebSocketResult<IncomingMessage> {
    serde_json::from_str(text).map_err(|e| WebSocketError::InvalidMessage(e.to_string()))
}
