//! Transport-agnostic connection handler.
//!
//! A [`ConnectionHandler`] owns one connection's identity and role and
//! reacts to three lifecycle hooks:
//!
//! - [`ConnectionHandler::on_open`] assigns an id and subscribes to the
//!   broadcast bus.
//! - [`ConnectionHandler::on_message`] dispatches one inbound text frame.
//! - [`ConnectionHandler::on_close`] removes the connection from presence.
//!
//! Replies go out through an `mpsc` sender supplied by the transport;
//! broadcasts arrive on the returned [`broadcast::Receiver`] and pass
//! through [`ConnectionHandler::accept_broadcast`] so a driver never sees
//! its own echo.

use std::sync::Arc;

use courier_types::{
    ClientMessage, ConnectionId, DeliveryRequest, DeliveryResponse, PositionReport, ServerMessage,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::delivery::{self, DeliveryError};
use crate::state::{AppState, Broadcast};

/// Envelope event name of a delivery request.
const DELIVERY_EVENT: &str = "obterCoordenadas";

/// What a connection has identified itself as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends position reports.
    Agent,
    /// Requests delivery quotes.
    Client,
}

/// Per-connection protocol state.
#[derive(Debug)]
pub struct ConnectionHandler {
    id: ConnectionId,
    role: Option<Role>,
    state: Arc<AppState>,
    outbound: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandler {
    /// Open a connection: assign an id, count it, and subscribe to the
    /// broadcast bus.
    pub fn on_open(
        state: Arc<AppState>,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> (Self, broadcast::Receiver<Broadcast>) {
        let id = ConnectionId::new();
        let rx = state.subscribe();
        let open = state.connection_opened();
        info!(connection = %id, open, "connection opened");
        (
            Self {
                id,
                role: None,
                state,
                outbound,
            },
            rx,
        )
    }

    /// This connection's id.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Role assumed from the first message that implies one.
    pub const fn role(&self) -> Option<Role> {
        self.role
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed envelopes are logged and dropped, except a delivery request
    /// whose payload carries no usable address: that one is answered with
    /// the invalid-address `erro`. Delivery replies are sent from their own
    /// task so the connection keeps receiving broadcasts; the task handle is
    /// returned for callers that want to await the reply.
    pub async fn on_message(&mut self, text: &str) -> Option<JoinHandle<()>> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(m) => m,
            Err(e) => {
                if event_of(text).as_deref() == Some(DELIVERY_EVENT) {
                    warn!(connection = %self.id, error = %e, "delivery request without address");
                    let rejected = DeliveryError::InvalidAddress {
                        chars: 0,
                        min: self.state.delivery.min_address_chars,
                    };
                    let response = DeliveryResponse::failure(rejected.user_message());
                    return Some(self.spawn_reply(response));
                }
                warn!(connection = %self.id, error = %e, "dropping malformed message");
                return None;
            }
        };

        match message {
            ClientMessage::PositionReport(report) => {
                self.handle_position(&report).await;
                None
            }
            ClientMessage::DeliveryRequest(request) => Some(self.spawn_delivery(request)),
        }
    }

    /// Filter a bus message for this connection. Returns `None` for the
    /// connection's own broadcasts.
    pub fn accept_broadcast(&self, broadcast: &Broadcast) -> Option<ServerMessage> {
        (broadcast.origin != self.id).then(|| broadcast.message.clone())
    }

    /// Close the connection. If it owned the active driver position, the
    /// position is cleared immediately.
    pub async fn on_close(self) {
        let was_agent = self.state.presence.write().await.remove(self.id);
        let open = self.state.connection_closed();
        info!(connection = %self.id, role = ?self.role, was_agent, open, "connection closed");
    }

    async fn handle_position(&mut self, report: &PositionReport) {
        let stored = {
            let mut presence = self.state.presence.write().await;
            if self.role != Some(Role::Agent) {
                presence.register(self.id);
            }
            presence.update(self.id, report)
        };
        self.role = Some(Role::Agent);

        if let Some(position) = stored {
            let receivers = self
                .state
                .broadcast(self.id, ServerMessage::LocationUpdate(position.to_broadcast()));
            debug!(connection = %self.id, receivers, "position broadcast");
        }
    }

    fn spawn_delivery(&mut self, request: DeliveryRequest) -> JoinHandle<()> {
        self.assume_client();
        let id = self.id;
        let state = Arc::clone(&self.state);
        let outbound = self.outbound.clone();
        debug!(connection = %id, address = request.address(), "delivery requested");

        tokio::spawn(async move {
            let response = delivery::respond(&state, &request).await;
            reply(&outbound, id, response).await;
        })
    }

    fn spawn_reply(&mut self, response: DeliveryResponse) -> JoinHandle<()> {
        self.assume_client();
        let id = self.id;
        let outbound = self.outbound.clone();
        tokio::spawn(async move { reply(&outbound, id, response).await })
    }

    fn assume_client(&mut self) {
        if self.role.is_none() {
            self.role = Some(Role::Client);
        }
    }
}

async fn reply(outbound: &mpsc::Sender<ServerMessage>, id: ConnectionId, response: DeliveryResponse) {
    if outbound
        .send(ServerMessage::DeliveryData(response))
        .await
        .is_err()
    {
        debug!(connection = %id, "connection closed before delivery reply");
    }
}

/// The `event` name of a JSON envelope whose payload failed to parse.
fn event_of(text: &str) -> Option<String> {
    let envelope = serde_json::from_str::<serde_json::Value>(text).ok()?;
    envelope.get("event")?.as_str().map(str::to_owned)
}
