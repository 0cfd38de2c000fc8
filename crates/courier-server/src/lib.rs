//! Realtime courier tracking server.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` channel** (`/ws`) where drivers push positions and
//!   clients request delivery ETAs
//! - **Administrative endpoints** (`/health`, `DELETE /api/cache`)
//!
//! # Architecture
//!
//! ```text
//! socket --> ws adapter --> ConnectionHandler --+--> PresenceRegistry
//!               ^                               |        |
//!               |                               |   broadcast bus --> other sockets
//!               |                               |
//!               +---- mpsc reply <---- delivery task --> resolver / router
//! ```
//!
//! All shared state lives in [`AppState`]. Locks are held only across
//! synchronous sections, never across a provider call. Background
//! [`sweeper`] tasks expire stale drivers and cache entries.

pub mod channel;
pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod router;
pub mod server;
pub mod state;
pub mod sweeper;
pub mod ws;

pub use channel::{ConnectionHandler, Role};
pub use config::{ConfigError, CourierConfig, DeliveryConfig, LoggingConfig, PresenceConfig};
pub use delivery::DeliveryError;
pub use error::ApiError;
pub use presence::{AgentPosition, PresenceRegistry, PresenceState, StaleSweep};
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, start_server};
pub use state::{AppState, Broadcast};
pub use sweeper::{Sweepers, spawn_sweepers};
