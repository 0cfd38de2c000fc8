//! Shared type definitions for the courier tracker.
//!
//! This crate is the single source of truth for types used across the
//! workspace. Wire message types flow downstream to `TypeScript` via
//! `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (connection identity)
//! - [`geo`] -- Coordinates, resolved addresses, haversine distance
//! - [`messages`] -- Realtime channel envelopes and payloads

pub mod geo;
pub mod ids;
pub mod messages;

// Re-export all public types at crate root for convenience.
pub use geo::{Coordinate, CoordinateError, EARTH_RADIUS_METERS, ResolvedAddress};
pub use ids::ConnectionId;
pub use messages::{
    ClientMessage, DeliveryQuote, DeliveryRequest, DeliveryResponse, PositionBroadcast,
    PositionReport, ServerMessage,
};
