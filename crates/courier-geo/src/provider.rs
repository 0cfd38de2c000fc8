//! Geocoding provider backends.
//!
//! Uses enum dispatch instead of trait objects so the async `attempt`
//! method stays dyn-free. Every backend honors the same contract:
//! one HTTP exchange, bounded by the caller's deadline, yielding either a
//! [`ResolvedAddress`] or a [`ProviderError`]. Retry policy lives in the
//! resolver, not here.

use std::time::Duration;

use courier_types::{Coordinate, ResolvedAddress};
use tracing::debug;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;

// ---------------------------------------------------------------------------
// Unified provider enum
// ---------------------------------------------------------------------------

/// A geocoding backend that turns free-text addresses into coordinates.
#[derive(Debug, Clone)]
pub enum GeocodeProvider {
    /// `OpenStreetMap` Nominatim.
    Nominatim(NominatimProvider),
    /// `OpenRouteService` geocoding.
    OpenRouteService(OrsGeocodeProvider),
}

impl GeocodeProvider {
    /// Make a single lookup for `address`, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] on timeout, transport failure,
    /// non-success status, empty result, or malformed body.
    pub async fn attempt(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<ResolvedAddress, ProviderError> {
        match self {
            Self::Nominatim(provider) => provider.attempt(address, timeout).await,
            Self::OpenRouteService(provider) => provider.attempt(address, timeout).await,
        }
    }

    /// Short provider name used in cache keys and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nominatim(_) => NominatimProvider::NAME,
            Self::OpenRouteService(_) => OrsGeocodeProvider::NAME,
        }
    }
}

// ---------------------------------------------------------------------------
// Nominatim
// ---------------------------------------------------------------------------

/// Nominatim search backend (`GET /search?format=json&limit=1`).
#[derive(Debug, Clone)]
pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimProvider {
    /// Provider name used in cache keys and logs.
    pub const NAME: &'static str = "nominatim";

    /// Create a Nominatim backend rooted at `base_url`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn attempt(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<ResolvedAddress, ProviderError> {
        let url = format!("{}/search", self.base_url);
        debug!(provider = Self::NAME, address, "geocoding");

        let request = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")]);

        let json = send_json(Self::NAME, timeout, request).await?;
        extract_nominatim(&json, address)
    }
}

/// Extract the first hit from a Nominatim JSON array response.
///
/// Nominatim encodes `lat`/`lon` as decimal strings.
fn extract_nominatim(
    json: &serde_json::Value,
    query: &str,
) -> Result<ResolvedAddress, ProviderError> {
    let provider = NominatimProvider::NAME;
    let first = json
        .as_array()
        .ok_or_else(|| ProviderError::Malformed {
            provider,
            message: "expected a JSON array".to_owned(),
        })?
        .first()
        .ok_or(ProviderError::EmptyResult { provider })?;

    let lat = lenient_f64(first.get("lat"));
    let lon = lenient_f64(first.get("lon"));
    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(ProviderError::Malformed {
            provider,
            message: "result missing lat/lon".to_owned(),
        });
    };

    let coordinate = Coordinate::validated(lat, lon).map_err(|e| ProviderError::Malformed {
        provider,
        message: e.to_string(),
    })?;

    let label = first
        .get("display_name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(query);

    Ok(ResolvedAddress::new(coordinate, label))
}

// ---------------------------------------------------------------------------
// OpenRouteService geocoding
// ---------------------------------------------------------------------------

/// `OpenRouteService` geocoding backend (`GET /geocode/search`).
///
/// The response is a `GeoJSON` `FeatureCollection` whose positions are
/// `[lon, lat]`.
#[derive(Debug, Clone)]
pub struct OrsGeocodeProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OrsGeocodeProvider {
    /// Provider name used in cache keys and logs.
    pub const NAME: &'static str = "openrouteservice";

    /// Create an `OpenRouteService` geocoding backend.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn attempt(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<ResolvedAddress, ProviderError> {
        let url = format!("{}/geocode/search", self.base_url);
        debug!(provider = Self::NAME, address, "geocoding");

        let request = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .header("Accept", "application/json")
            .query(&[
                ("text", address),
                ("size", "1"),
                ("api_key", self.api_key.as_str()),
            ]);

        let json = send_json(Self::NAME, timeout, request).await?;
        extract_ors_feature(&json, address)
    }
}

/// Extract the first feature from an `OpenRouteService` geocode response.
fn extract_ors_feature(
    json: &serde_json::Value,
    query: &str,
) -> Result<ResolvedAddress, ProviderError> {
    let provider = OrsGeocodeProvider::NAME;
    let feature = json
        .get("features")
        .and_then(serde_json::Value::as_array)
        .and_then(|features| features.first())
        .ok_or(ProviderError::EmptyResult { provider })?;

    let position: Vec<f64> = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(serde_json::Value::as_array)
        .map(|values| values.iter().filter_map(serde_json::Value::as_f64).collect())
        .unwrap_or_default();

    let coordinate =
        Coordinate::from_lon_lat(&position).ok_or_else(|| ProviderError::Malformed {
            provider,
            message: "feature geometry is not a valid [lon, lat] position".to_owned(),
        })?;

    let label = feature
        .get("properties")
        .and_then(|p| p.get("label"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(query);

    Ok(ResolvedAddress::new(coordinate, label))
}

// ---------------------------------------------------------------------------
// Shared HTTP exchange
// ---------------------------------------------------------------------------

/// Send `request`, require a success status, and parse the body as JSON,
/// all within `timeout`.
pub(crate) async fn send_json(
    provider: &'static str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ProviderError> {
    match tokio::time::timeout(timeout, exchange(provider, request)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ProviderError::Timeout {
            provider,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

async fn exchange(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Transport {
            provider,
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
        });
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ProviderError::Malformed {
            provider,
            message: e.to_string(),
        })
}

/// Read a JSON number or a numeric string.
fn lenient_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create a geocoding provider from configuration.
///
/// Dispatches to [`NominatimProvider`] or [`OrsGeocodeProvider`] based on
/// the configured [`ProviderKind`].
pub fn create_provider(config: &ProviderConfig, client: reqwest::Client) -> GeocodeProvider {
    match config.kind {
        ProviderKind::Nominatim => {
            GeocodeProvider::Nominatim(NominatimProvider::new(client, config.base_url()))
        }
        ProviderKind::OpenRouteService => GeocodeProvider::OpenRouteService(
            OrsGeocodeProvider::new(client, config.base_url(), config.api_key.clone()),
        ),
    }
}
