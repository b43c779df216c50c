//! Axum WebSocket handler
//!
//! This module contains the WebSocket upgrade handler and the per-connection
//! loop that owns one [`Session`].

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use crate::core::session::{Session, SessionEvent};
use crate::state::AppState;

use super::{
    messages::{MessageRoute, OutgoingMessage},
    processor::{handle_incoming_message, parse_message},
};

/// Buffer for direct replies to the client
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// How often a connection checks its session for a stuck state
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

/// How long teardown waits for queued events to reach the client
const FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// WebSocket voice dialogue handler
/// Upgrades the HTTP connection to WebSocket and starts a session on it
pub async fn ws_voice_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("WebSocket voice connection upgrade requested");
    ws.on_upgrade(move |socket| handle_voice_socket(socket, state))
}

/// Drive one connection: client frames in, session events out.
async fn handle_voice_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session_id = %session_id, "WebSocket voice connection established");

    let (mut sender, mut receiver) = socket.split();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (mut session, mut inputs) = Session::new(
        session_id.clone(),
        app_state.session_config.clone(),
        app_state.services.clone(),
        events_tx,
    );

    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    // Outgoing frames. Session events go first so that none are lost when
    // the reply channel closes at teardown.
    let sender_task = tokio::spawn(async move {
        loop {
            let message = select! {
                biased;
                Some(event) = events_rx.recv() => OutgoingMessage::from(event),
                route = message_rx.recv() => match route {
                    Some(MessageRoute::Outgoing(message)) => message,
                    Some(MessageRoute::Close) => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                },
            };

            let result = match serde_json::to_string(&message) {
                Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    if let Err(e) = app_state.sessions.register(session.status().clone()) {
        error!(session_id = %session_id, "Failed to register session: {}", e);
        let _ = message_tx
            .send(MessageRoute::Outgoing(OutgoingMessage::Error {
                message: e.to_string(),
            }))
            .await;
        let _ = message_tx.send(MessageRoute::Close).await;
        let _ = tokio::time::timeout(FLUSH_TIMEOUT, sender_task).await;
        return;
    }

    let _ = message_tx
        .send(MessageRoute::Outgoing(OutgoingMessage::Connected {
            session_id: session_id.clone(),
        }))
        .await;

    let mut watchdog = tokio::time::interval(WATCHDOG_INTERVAL);
    watchdog.tick().await;

    loop {
        select! {
            msg_result = receiver.next() => {
                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_message(msg, &mut session, &message_tx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(session_id = %session_id, "WebSocket connection closed by client");
                        break;
                    }
                }
            }
            Some(signal) = inputs.next() => {
                session.handle_signal(signal).await;
            }
            _ = watchdog.tick() => {
                session.check_watchdog();
            }
        }
    }

    // Cancel everything the session still runs before it leaves the registry
    session.close();
    app_state.sessions.unregister(&session_id);
    drop(session);
    drop(inputs);
    drop(message_tx);

    if tokio::time::timeout(FLUSH_TIMEOUT, sender_task).await.is_err() {
        debug!(session_id = %session_id, "Sender task still busy at teardown");
    }

    info!(session_id = %session_id, "WebSocket voice connection terminated");
}

/// Process one client frame.
///
/// Returns false when the connection should end.
async fn process_message(
    msg: Message,
    session: &mut Session,
    message_tx: &mpsc::Sender<MessageRoute>,
) -> bool {
    match msg {
        Message::Text(text) => {
            debug!("Received text message: {} bytes", text.len());

            match parse_message(&text) {
                Ok(incoming) => handle_incoming_message(incoming, session, message_tx).await,
                Err(e) => {
                    warn!("Failed to parse incoming message: {}", e);
                    let _ = message_tx
                        .send(MessageRoute::Outgoing(OutgoingMessage::Error {
                            message: e.to_message(),
                        }))
                        .await;
                    true
                }
            }
        }
        Message::Binary(data) => {
            session.handle_audio(&data).await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("WebSocket connection closed by client");
            false
        }
    }
}
