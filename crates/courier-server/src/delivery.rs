//! Delivery ETA pipeline.
//!
//! One request runs through:
//!
//! 1. Address validation (trimmed, at least `min_address_chars`).
//! 2. Origin selection: the active driver position, else the configured
//!    default origin.
//! 3. Destination: supplied coordinates when valid, else the geocode
//!    resolver.
//! 4. Straight-line distance gate (haversine), before any routing call.
//! 5. Route calculation and response formatting.
//!
//! No lock is held across a network await. A driver update that lands
//! while this request is waiting on a provider is simply not observed.

use courier_geo::{GeocodeError, RouteError};
use courier_types::{DeliveryQuote, DeliveryRequest, DeliveryResponse, ResolvedAddress};
use tracing::{info, warn};

use crate::state::AppState;

/// Why a delivery request could not be answered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    /// The address is too short to be worth geocoding.
    #[error("address too short: {chars} chars, minimum {min}")]
    InvalidAddress {
        /// Characters after trimming.
        chars: usize,
        /// Configured minimum.
        min: usize,
    },

    /// No geocoding provider could resolve the address.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// The routing provider failed or found no route.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// The destination is farther than the delivery radius.
    #[error("destination {meters:.0} m away exceeds limit of {limit:.0} m")]
    DistanceLimitExceeded {
        /// Straight-line distance from origin to destination.
        meters: f64,
        /// Configured limit.
        limit: f64,
    },
}

impl DeliveryError {
    /// Fixed user-facing message sent in the `erro` field.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidAddress { min, .. } => {
                format!("Endereço inválido. Informe ao menos {min} caracteres.")
            }
            Self::Geocode(_) => "Erro ao obter coordenadas. Confira o endereço.".to_owned(),
            Self::Route(_) => "Erro ao calcular rota.".to_owned(),
            Self::DistanceLimitExceeded { limit, .. } => format!(
                "Endereço fora da área de entrega (limite de {:.0} km).",
                limit / 1000.0
            ),
        }
    }
}

/// Answer `request`, turning any failure into a user-facing `erro`.
pub async fn respond(state: &AppState, request: &DeliveryRequest) -> DeliveryResponse {
    match quote(state, request).await {
        Ok(quote) => DeliveryResponse::Quote(quote),
        Err(e) => {
            warn!(address = request.address(), error = %e, "delivery request failed");
            DeliveryResponse::failure(e.user_message())
        }
    }
}

/// Run the full pipeline for `request`.
///
/// # Errors
///
/// See [`DeliveryError`]; validation and distance failures are returned
/// before any routing call is made.
pub async fn quote(
    state: &AppState,
    request: &DeliveryRequest,
) -> Result<DeliveryQuote, DeliveryError> {
    let rules = &state.delivery;
    let address = request.address().trim();
    let chars = address.chars().count();
    if chars < rules.min_address_chars {
        return Err(DeliveryError::InvalidAddress {
            chars,
            min: rules.min_address_chars,
        });
    }

    let active = state.presence.read().await.active();
    let origin = active.map_or_else(
        || {
            warn!(
                lat = rules.default_origin.lat,
                lon = rules.default_origin.lon,
                "no active driver, routing from default origin"
            );
            rules.default_origin
        },
        |position| position.coordinate,
    );

    let destination = match request.supplied_coordinate() {
        Some(coordinate) => ResolvedAddress::new(coordinate, address),
        None => state.resolver.resolve(address).await?,
    };

    let meters = origin.haversine_meters(&destination.coordinate);
    if meters > rules.max_distance_meters {
        return Err(DeliveryError::DistanceLimitExceeded {
            meters,
            limit: rules.max_distance_meters,
        });
    }

    let route = state
        .routes
        .route(origin, destination.coordinate)
        .await?;

    let minutes = estimated_minutes(route.duration_seconds);
    info!(
        address,
        minutes,
        distance_m = route.distance_meters,
        "delivery quoted"
    );

    Ok(DeliveryQuote {
        estimated_minutes: minutes,
        formatted_duration: format_duration(minutes),
        distance_km: format_distance_km(route.distance_meters),
        destination: destination.coordinate,
        geometry: route.geometry,
        full_address: destination.label,
    })
}

/// Whole minutes, rounded up. Non-finite or negative input yields zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn estimated_minutes(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    // Saturating float-to-int cast.
    (seconds / 60.0).ceil() as u64
}

/// `"12 min"` under an hour, `"1 h 05 min"` from an hour up.
pub fn format_duration(minutes: u64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours == 0 {
        format!("{rest} min")
    } else {
        format!("{hours} h {rest:02} min")
    }
}

/// Meters as kilometers with two decimals (`2431.7` becomes `"2.43"`).
pub fn format_distance_km(meters: f64) -> String {
    format!("{:.2}", meters / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_round_up() {
        assert_eq!(estimated_minutes(0.0), 0);
        assert_eq!(estimated_minutes(1.0), 1);
        assert_eq!(estimated_minutes(60.0), 1);
        assert_eq!(estimated_minutes(61.0), 2);
        assert_eq!(estimated_minutes(412.3), 7);
        assert_eq!(estimated_minutes(-5.0), 0);
        assert_eq!(estimated_minutes(f64::NAN), 0);
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "0 min");
        assert_eq!(format_duration(12), "12 min");
        assert_eq!(format_duration(60), "1 h 00 min");
        assert_eq!(format_duration(65), "1 h 05 min");
        assert_eq!(format_duration(135), "2 h 15 min");
    }

    #[test]
    fn distance_has_two_decimals() {
        assert_eq!(format_distance_km(2431.7), "2.43");
        assert_eq!(format_distance_km(0.0), "0.00");
        assert_eq!(format_distance_km(100_000.0), "100.00");
    }

    #[test]
    fn user_messages_are_portuguese_and_generic() {
        assert_eq!(
            DeliveryError::Geocode(GeocodeError::NotFound).user_message(),
            "Erro ao obter coordenadas. Confira o endereço."
        );
        assert_eq!(
            DeliveryError::Route(RouteError::NoRoute).user_message(),
            "Erro ao calcular rota."
        );
        assert_eq!(
            DeliveryError::InvalidAddress { chars: 2, min: 5 }.user_message(),
            "Endereço inválido. Informe ao menos 5 caracteres."
        );
        let far = DeliveryError::DistanceLimitExceeded {
            meters: 100_001.0,
            limit: 100_000.0,
        };
        assert!(far.user_message().contains("limite de 100 km"));
    }
}
