//! Integration tests for the geocode resolver and route calculator.
//!
//! Providers are served by a local `wiremock` server so retry counts,
//! fallback ordering, timeouts, and coordinate order can be asserted on
//! the exact HTTP traffic.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use courier_geo::{
    GeocodeError, GeocodeResolver, GeocodingConfig, ProviderConfig, ProviderError, ProviderKind,
    RouteCalculator, RouteError, RoutingConfig, cache_key,
};
use courier_types::Coordinate;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn geocoding_config(uri: &str, timeout_ms: u64) -> GeocodingConfig {
    GeocodingConfig {
        providers: vec![
            ProviderConfig {
                kind: ProviderKind::Nominatim,
                base_url: Some(uri.to_owned()),
                api_key: String::new(),
                attempts: 3,
                timeout_ms,
                backoff_ms: 5,
            },
            ProviderConfig {
                kind: ProviderKind::OpenRouteService,
                base_url: Some(uri.to_owned()),
                api_key: "test-key".to_owned(),
                attempts: 1,
                timeout_ms,
                backoff_ms: 0,
            },
        ],
        ..GeocodingConfig::default()
    }
}

fn resolver(server: &MockServer) -> GeocodeResolver {
    GeocodeResolver::from_config(
        &geocoding_config(&server.uri(), 2_000),
        &reqwest::Client::new(),
    )
}

fn nominatim_hit() -> serde_json::Value {
    json!([{
        "lat": "-30.0500",
        "lon": "-51.2000",
        "display_name": "Rua Example, 123, Porto Alegre, RS, Brasil"
    }])
}

fn ors_hit() -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "geometry": {"type": "Point", "coordinates": [-51.21, -30.06]},
            "properties": {"label": "Rua Example 123, Porto Alegre, RS"}
        }]
    })
}

// =========================================================================
// Geocode resolver
// =========================================================================

#[tokio::test]
async fn primary_success_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Rua Example 123, RS, Brasil"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nominatim_hit()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/geocode/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ors_hit()))
        .expect(0)
        .mount(&server)
        .await;

    let r = resolver(&server);
    let first = r.resolve("Rua Example 123").await.unwrap();
    assert_eq!(first.coordinate, Coordinate::new(-30.05, -51.2));
    assert_eq!(first.label, "Rua Example, 123, Porto Alegre, RS, Brasil");

    // Different spacing and case normalize to the same key.
    let second = r.resolve("  rua example 123 ").await.unwrap();
    assert_eq!(second, first);

    let key = cache_key("nominatim", "Rua Example 123, RS, Brasil");
    assert_eq!(r.cache().get(&key).await, Some(first));
}

#[tokio::test]
async fn fallback_runs_once_after_three_primary_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/geocode/search"))
        .and(header("Authorization", "test-key"))
        .and(query_param("text", "Rua Example 123, RS, Brasil"))
        .and(query_param("size", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ors_hit()))
        .expect(1)
        .mount(&server)
        .await;

    let r = resolver(&server);
    let resolved = r.resolve("Rua Example 123").await.unwrap();
    assert_eq!(resolved.coordinate, Coordinate::new(-30.06, -51.21));
    assert_eq!(resolved.label, "Rua Example 123, Porto Alegre, RS");

    let key = cache_key("openrouteservice", "Rua Example 123, RS, Brasil");
    assert!(r.cache().get(&key).await.is_some());
}

#[tokio::test]
async fn primary_backoff_grows_with_each_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/geocode/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ors_hit()))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = geocoding_config(&server.uri(), 2_000);
    for provider in &mut config.providers {
        if provider.kind == ProviderKind::Nominatim {
            provider.backoff_ms = 100;
        }
    }
    let r = GeocodeResolver::from_config(&config, &reqwest::Client::new());

    // 100 ms after the first failure, 200 ms after the second.
    let started = std::time::Instant::now();
    assert!(r.resolve("Rua Example 123").await.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn both_providers_failing_yields_generic_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/geocode/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let r = resolver(&server);
    let result = r.resolve("Rua Inexistente 999").await;
    assert_eq!(result, Err(GeocodeError::NotFound));
    assert_eq!(GeocodeError::NotFound.to_string(), "address not found");
    assert!(r.cache().is_empty().await);
}

#[tokio::test]
async fn empty_primary_results_count_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/geocode/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ors_hit()))
        .expect(1)
        .mount(&server)
        .await;

    let r = resolver(&server);
    assert!(r.resolve("Rua Example 123").await.is_ok());
}

#[tokio::test]
async fn primary_timeouts_count_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(nominatim_hit())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/geocode/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ors_hit()))
        .expect(1)
        .mount(&server)
        .await;

    let r = GeocodeResolver::from_config(
        &geocoding_config(&server.uri(), 50),
        &reqwest::Client::new(),
    );
    let resolved = r.resolve("Rua Example 123").await.unwrap();
    assert_eq!(resolved.coordinate, Coordinate::new(-30.06, -51.21));
}

#[tokio::test]
async fn single_provider_attempt_reports_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let config = ProviderConfig {
        base_url: Some(server.uri()),
        ..ProviderConfig::nominatim()
    };
    let provider = courier_geo::create_provider(&config, reqwest::Client::new());
    let result = provider
        .attempt("Rua Example 123", Duration::from_millis(50))
        .await;
    assert_eq!(
        result,
        Err(ProviderError::Timeout {
            provider: "nominatim",
            timeout_ms: 50
        })
    );
}

// =========================================================================
// Route calculator
// =========================================================================

fn calculator(server: &MockServer, timeout_ms: u64) -> RouteCalculator {
    RouteCalculator::new(
        RoutingConfig {
            base_url: server.uri(),
            api_key: "test-key".to_owned(),
            profile: "driving-car".to_owned(),
            timeout_ms,
        },
        reqwest::Client::new(),
    )
}

#[tokio::test]
async fn route_sends_lon_lat_and_returns_lat_lon() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/directions/driving-car/geojson"))
        .and(header("Authorization", "test-key"))
        .and(body_json(json!({
            "coordinates": [[-51.2177, -30.0346], [-51.2, -30.05]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "FeatureCollection",
            "features": [{
                "properties": {"summary": {"distance": 2431.7, "duration": 412.0}},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-51.2177, -30.0346], [-51.2, -30.05]]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let route = calculator(&server, 2_000)
        .route(
            Coordinate::new(-30.0346, -51.2177),
            Coordinate::new(-30.05, -51.2),
        )
        .await
        .unwrap();

    assert_eq!(
        route.geometry,
        vec![
            Coordinate::new(-30.0346, -51.2177),
            Coordinate::new(-30.05, -51.2)
        ]
    );
    assert!((route.distance_meters - 2431.7).abs() < 1e-9);
    assert!((route.duration_seconds - 412.0).abs() < 1e-9);
}

#[tokio::test]
async fn route_is_not_retried_on_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/directions/driving-car/geojson"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let result = calculator(&server, 2_000)
        .route(Coordinate::new(-30.0, -51.0), Coordinate::new(-30.1, -51.1))
        .await;
    assert!(matches!(
        result,
        Err(RouteError::Provider(ProviderError::Status { status: 500, .. }))
    ));
}

#[tokio::test]
async fn route_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/directions/driving-car/geojson"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let result = calculator(&server, 50)
        .route(Coordinate::new(-30.0, -51.0), Coordinate::new(-30.1, -51.1))
        .await;
    assert!(matches!(
        result,
        Err(RouteError::Provider(ProviderError::Timeout { .. }))
    ));
}

#[tokio::test]
async fn route_with_no_features_is_no_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/directions/driving-car/geojson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"features": []})))
        .mount(&server)
        .await;

    let result = calculator(&server, 2_000)
        .route(Coordinate::new(-30.0, -51.0), Coordinate::new(-30.1, -51.1))
        .await;
    assert_eq!(result, Err(RouteError::NoRoute));
}
