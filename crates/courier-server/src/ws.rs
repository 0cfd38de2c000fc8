//! `WebSocket` adapter for the realtime channel.
//!
//! Clients connect to `GET /ws` and exchange JSON text frames of the form
//! `{"event": ..., "data": ...}`. Each socket is bridged to a
//! [`ConnectionHandler`] by multiplexing three sources:
//!
//! - inbound frames from the socket
//! - replies addressed to this connection (`mpsc`)
//! - the shared broadcast bus
//!
//! If a client falls behind the bus, lagged messages are skipped and the
//! client resumes from the most recent one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use courier_types::ServerMessage;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::channel::ConnectionHandler;
use crate::state::AppState;

/// Replies buffered per connection before delivery tasks wait.
const OUTBOUND_CAPACITY: usize = 32;

/// Upgrade an HTTP request to a realtime `WebSocket` connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_channel(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (mut handler, mut rx) = ConnectionHandler::on_open(state, outbound_tx);

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(broadcast) => {
                        let Some(msg) = handler.accept_broadcast(&broadcast) else {
                            continue;
                        };
                        if send(&mut socket, &msg).await.is_err() {
                            debug!(connection = %handler.id(), "send failed, closing");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(connection = %handler.id(), skipped, "client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("broadcast bus closed, shutting down connection");
                        break;
                    }
                }
            }
            Some(reply) = outbound_rx.recv() => {
                if send(&mut socket, &reply).await.is_err() {
                    debug!(connection = %handler.id(), "reply send failed, closing");
                    break;
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Delivery tasks report back through `outbound_rx`.
                        drop(handler.on_message(text.as_str()).await);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection = %handler.id(), error = %e, "websocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    handler.on_close().await;
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "failed to serialize outbound message");
            Ok(())
        }
    }
}
