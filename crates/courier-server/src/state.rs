//! Shared application state for the tracker server.
//!
//! [`AppState`] holds the broadcast bus that fans driver positions out to
//! every connection, the presence registry, and the geocoding and routing
//! clients. It is wrapped in [`Arc`] and injected via Axum's `State`
//! extractor; nothing lives in globals.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use courier_geo::{GeocodeResolver, RouteCalculator};
use courier_types::{ConnectionId, ServerMessage};
use tokio::sync::{RwLock, broadcast};

use crate::config::{CourierConfig, DeliveryConfig, PresenceConfig};
use crate::presence::PresenceRegistry;
use crate::server::ServerError;

/// Capacity of the broadcast bus.
///
/// A subscriber that falls behind by more than this many messages gets
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest one.
const BROADCAST_CAPACITY: usize = 256;

/// A message on the broadcast bus, tagged with the connection that caused
/// it so that connection can skip its own echo.
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// Connection that published the message.
    pub origin: ConnectionId,
    /// Payload forwarded to every other connection.
    pub message: ServerMessage,
}

/// Shared state for the Axum application.
pub struct AppState {
    /// Broadcast sender for position updates.
    pub tx: broadcast::Sender<Broadcast>,
    /// Driver presence and the active routing origin.
    pub presence: RwLock<PresenceRegistry>,
    /// Address to coordinate resolution (owns the geocode cache).
    pub resolver: GeocodeResolver,
    /// Route calculation.
    pub routes: RouteCalculator,
    /// Delivery business rules.
    pub delivery: DeliveryConfig,
    /// Driver staleness policy.
    pub presence_policy: PresenceConfig,
    connections: AtomicUsize,
}

impl AppState {
    /// Create state from already-built geo clients.
    pub fn new(
        resolver: GeocodeResolver,
        routes: RouteCalculator,
        delivery: DeliveryConfig,
        presence_policy: PresenceConfig,
    ) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            presence: RwLock::new(PresenceRegistry::new()),
            resolver,
            routes,
            delivery,
            presence_policy,
            connections: AtomicUsize::new(0),
        }
    }

    /// Build state from the full configuration, including one shared
    /// HTTP client for every provider.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::HttpClient`] if the HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &CourierConfig) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .user_agent(config.geocoding.user_agent.clone())
            .build()
            .map_err(|e| ServerError::HttpClient(e.to_string()))?;

        Ok(Self::new(
            GeocodeResolver::from_config(&config.geocoding, &client),
            RouteCalculator::new(config.routing.clone(), client),
            config.delivery.clone(),
            config.presence.clone(),
        ))
    }

    /// Subscribe to the broadcast bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.tx.subscribe()
    }

    /// Publish to every subscriber.
    ///
    /// Returns the number of receivers that got the message. Returns 0
    /// if nobody is connected (this is not an error).
    pub fn broadcast(&self, origin: ConnectionId, message: ServerMessage) -> usize {
        self.tx.send(Broadcast { origin, message }).unwrap_or(0)
    }

    /// Record a new connection. Returns the new count.
    pub fn connection_opened(&self) -> usize {
        self.connections.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Record a closed connection. Returns the new count.
    pub fn connection_closed(&self) -> usize {
        let previous = self
            .connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Share this state behind an [`Arc`].
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("connections", &self.connection_count())
            .field("subscribers", &self.tx.receiver_count())
            .field("providers", &self.resolver.provider_names())
            .finish_non_exhaustive()
    }
}
