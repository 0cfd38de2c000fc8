//! Realtime wire messages exchanged over the `WebSocket` channel.
//!
//! Every frame is a JSON envelope `{"event": <name>, "data": <payload>}`.
//! Event and field names are the protocol's Portuguese names; the Rust
//! side uses English identifiers and `serde` renames.
//!
//! | Direction | Event | Payload |
//! |-----------|-------|---------|
//! | agent -> server | `localizacaoMotorista` | [`PositionReport`] |
//! | client -> server | `obterCoordenadas` | [`DeliveryRequest`] |
//! | server -> others | `atualizacaoLocalizacao` | [`PositionBroadcast`] |
//! | server -> requester | `dadosEntrega` | [`DeliveryResponse`] |

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::geo::Coordinate;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A message sent by a connection to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Live position pushed by a driver.
    #[serde(rename = "localizacaoMotorista")]
    PositionReport(PositionReport),
    /// ETA request for a delivery address.
    #[serde(rename = "obterCoordenadas")]
    DeliveryRequest(DeliveryRequest),
}

/// Raw position pushed by an agent. Validated by the presence registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PositionReport {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Reported GPS accuracy in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Client-side capture time in epoch milliseconds. Fractional values
    /// are rounded; anything non-numeric is treated as absent.
    #[serde(default, deserialize_with = "lenient_millis")]
    #[ts(type = "number | null")]
    pub timestamp: Option<i64>,
}

fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(millis_from_json))
}

#[allow(clippy::cast_possible_truncation)]
fn millis_from_json(value: &serde_json::Value) -> Option<i64> {
    if let Some(millis) = value.as_i64() {
        return Some(millis);
    }
    let millis = value.as_f64()?.round();
    // Saturating float-to-int cast.
    millis.is_finite().then_some(millis as i64)
}

/// Delivery request payload: a bare address or a structured request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum DeliveryRequest {
    /// Free-text address only.
    Address(String),
    /// Address plus optionally pre-resolved coordinates.
    Structured {
        /// Free-text address.
        #[serde(rename = "endereco")]
        address: String,
        /// Pre-resolved destination. Loosely typed so a malformed value
        /// falls back to geocoding instead of failing the whole message.
        #[serde(rename = "coordenadas", default)]
        coordinates: Option<serde_json::Value>,
    },
}

impl DeliveryRequest {
    /// The address text as sent by the client (untrimmed).
    pub fn address(&self) -> &str {
        match self {
            Self::Address(address) | Self::Structured { address, .. } => address,
        }
    }

    /// Supplied destination coordinates, if present and valid.
    pub fn supplied_coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Structured {
                coordinates: Some(value),
                ..
            } => Coordinate::from_json(value).ok(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A message sent by the server to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// A driver moved; fanned out to every other connection.
    #[serde(rename = "atualizacaoLocalizacao")]
    LocationUpdate(PositionBroadcast),
    /// Answer to a delivery request, sent to the requester only.
    #[serde(rename = "dadosEntrega")]
    DeliveryData(DeliveryResponse),
}

/// Trimmed position payload broadcast to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PositionBroadcast {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Epoch milliseconds of the position.
    #[ts(type = "number")]
    pub timestamp: i64,
}

/// Outcome of a delivery request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum DeliveryResponse {
    /// The route was computed.
    Quote(DeliveryQuote),
    /// The request failed; `erro` carries a user-facing message.
    Failure {
        /// User-facing error message.
        #[serde(rename = "erro")]
        error: String,
    },
}

impl DeliveryResponse {
    /// Build a failure response.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            error: message.into(),
        }
    }
}

/// Successful delivery estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeliveryQuote {
    /// Estimated travel time in whole minutes (rounded up).
    #[serde(rename = "tempoEstimado")]
    #[ts(type = "number")]
    pub estimated_minutes: u64,
    /// Travel time formatted for display (`"12 min"`, `"1 h 05 min"`).
    #[serde(rename = "tempoFormatado")]
    pub formatted_duration: String,
    /// Route distance in kilometers with two decimals.
    #[serde(rename = "distancia")]
    pub distance_km: String,
    /// Destination coordinates.
    #[serde(rename = "coordenadas")]
    pub destination: Coordinate,
    /// Route path in `(lat, lon)` order.
    #[serde(rename = "geometria")]
    pub geometry: Vec<Coordinate>,
    /// Canonical destination label.
    #[serde(rename = "enderecoCompleto")]
    pub full_address: String,
}
