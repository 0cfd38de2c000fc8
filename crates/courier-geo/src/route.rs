//! Route calculation against the `OpenRouteService` directions API.
//!
//! One attempt per request, never retried. The `GeoJSON` variant of
//! the directions endpoint is used so geometry arrives as plain `[lon, lat]`
//! positions; every position is transposed into canonical `(lat, lon)`
//! order before it leaves this module.

use courier_types::Coordinate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::error::RouteError;
use crate::provider::send_json;

const PROVIDER: &str = "openrouteservice-directions";

/// Duration, distance, and path of a computed route. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    /// Travel time in seconds.
    pub duration_seconds: f64,
    /// Travel distance in meters.
    pub distance_meters: f64,
    /// Path in `(lat, lon)` order, origin first.
    pub geometry: Vec<Coordinate>,
}

/// Client for the directions endpoint.
#[derive(Debug, Clone)]
pub struct RouteCalculator {
    client: reqwest::Client,
    config: RoutingConfig,
}

impl RouteCalculator {
    /// Create a calculator from the `routing` config section.
    pub fn new(config: RoutingConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Compute a route from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// - [`RouteError::InvalidCoordinate`] if either point fails the range
    ///   check (no request is made).
    /// - [`RouteError::Provider`] on timeout, transport, or status failure.
    /// - [`RouteError::NoRoute`] if the provider returned no usable route.
    pub async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteResult, RouteError> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(RouteError::InvalidCoordinate);
        }

        let url = format!(
            "{}/v2/directions/{}/geojson",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile
        );
        let body = serde_json::json!({
            "coordinates": [origin.to_lon_lat(), destination.to_lon_lat()]
        });
        debug!(%url, ?origin, ?destination, "requesting route");

        let request = self
            .client
            .post(&url)
            .header("Authorization", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body);

        let json = send_json(PROVIDER, self.config.timeout(), request)
            .await
            .inspect_err(|e| warn!(error = %e, "routing provider failed"))?;

        extract_route(&json)
    }
}

/// Extract summary and geometry from a directions `GeoJSON` response.
///
/// `OpenRouteService` omits `distance`/`duration` for zero-length routes,
/// so missing summary values read as zero.
fn extract_route(json: &serde_json::Value) -> Result<RouteResult, RouteError> {
    let feature = json
        .get("features")
        .and_then(serde_json::Value::as_array)
        .and_then(|features| features.first())
        .ok_or(RouteError::NoRoute)?;

    let summary = feature.get("properties").and_then(|p| p.get("summary"));
    let read = |field: &str| {
        summary
            .and_then(|s| s.get(field))
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0)
    };

    let positions = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(serde_json::Value::as_array)
        .ok_or(RouteError::NoRoute)?;

    let geometry = positions
        .iter()
        .map(|position| {
            let pair: Vec<f64> = position
                .as_array()
                .map(|p| p.iter().filter_map(serde_json::Value::as_f64).collect())
                .unwrap_or_default();
            Coordinate::from_lon_lat(&pair).ok_or(RouteError::NoRoute)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RouteResult {
        duration_seconds: read("duration"),
        distance_meters: read("distance"),
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_route_transposes_geometry() {
        let json = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"summary": {"distance": 2431.7, "duration": 412.3}},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-51.2177, -30.0346], [-51.21, -30.04], [-51.20, -30.05]]
                }
            }]
        });
        let route = extract_route(&json);
        assert_eq!(
            route,
            Ok(RouteResult {
                duration_seconds: 412.3,
                distance_meters: 2431.7,
                geometry: vec![
                    Coordinate::new(-30.0346, -51.2177),
                    Coordinate::new(-30.04, -51.21),
                    Coordinate::new(-30.05, -51.20),
                ],
            })
        );
    }

    #[test]
    fn extract_route_defaults_missing_summary_to_zero() {
        let json = serde_json::json!({
            "features": [{
                "properties": {"summary": {}},
                "geometry": {"coordinates": [[-51.2, -30.05], [-51.2, -30.05]]}
            }]
        });
        let route = extract_route(&json).ok();
        assert_eq!(route.as_ref().map(|r| r.geometry.len()), Some(2));
        assert!(route.is_some_and(|r| r.distance_meters.abs() < f64::EPSILON));
    }

    #[test]
    fn extract_route_without_features() {
        let json = serde_json::json!({"features": []});
        assert_eq!(extract_route(&json), Err(RouteError::NoRoute));

        let json = serde_json::json!({"error": {"code": 2010}});
        assert_eq!(extract_route(&json), Err(RouteError::NoRoute));
    }

    #[tokio::test]
    async fn invalid_coordinates_fail_before_any_request() {
        let calc = RouteCalculator::new(RoutingConfig::default(), reqwest::Client::new());
        let result = calc
            .route(Coordinate::new(95.0, 0.0), Coordinate::new(0.0, 0.0))
            .await;
        assert_eq!(result, Err(RouteError::InvalidCoordinate));
    }
}
