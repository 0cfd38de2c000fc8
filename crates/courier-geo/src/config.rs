//! Typed configuration for geocoding providers and the routing provider.
//!
//! These structs are embedded in the service's YAML configuration
//! (`geocoding:` and `routing:` sections). Every field has a default that
//! matches the production provider contracts, so an empty section is valid.

use std::time::Duration;

use serde::Deserialize;

/// Public Nominatim instance.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Public `OpenRouteService` API.
pub const DEFAULT_OPENROUTESERVICE_URL: &str = "https://api.openrouteservice.org";

/// Supported geocoding provider types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `OpenStreetMap` Nominatim search API.
    Nominatim,
    /// `OpenRouteService` Pelias-based geocoding API.
    OpenRouteService,
}

/// Configuration for one geocoding provider strategy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Which provider contract to speak.
    pub kind: ProviderKind,
    /// Base URL without trailing path. Defaults to the public instance
    /// for [`ProviderConfig::kind`].
    pub base_url: Option<String>,
    /// API key (only used by `OpenRouteService`).
    pub api_key: String,
    /// Number of attempts before moving to the next provider.
    pub attempts: u32,
    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,
    /// Backoff unit in milliseconds; attempt `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl ProviderConfig {
    /// Default primary strategy: Nominatim, 3 attempts, 500 ms backoff.
    pub fn nominatim() -> Self {
        Self {
            kind: ProviderKind::Nominatim,
            base_url: None,
            api_key: String::new(),
            attempts: 3,
            timeout_ms: 10_000,
            backoff_ms: 500,
        }
    }

    /// Default fallback strategy: `OpenRouteService`, single attempt.
    pub fn openrouteservice() -> Self {
        Self {
            kind: ProviderKind::OpenRouteService,
            base_url: None,
            api_key: String::new(),
            attempts: 1,
            timeout_ms: 10_000,
            backoff_ms: 0,
        }
    }

    /// Effective base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        let url = self.base_url.as_deref().unwrap_or(match self.kind {
            ProviderKind::Nominatim => DEFAULT_NOMINATIM_URL,
            ProviderKind::OpenRouteService => DEFAULT_OPENROUTESERVICE_URL,
        });
        url.trim_end_matches('/')
    }

    /// Per-attempt deadline.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Backoff unit between attempts.
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::nominatim()
    }
}

/// Geocoding section: providers in fallback order plus cache policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Qualifier appended to addresses that do not already contain it.
    pub region_qualifier: String,
    /// `User-Agent` sent to providers (Nominatim's usage policy requires one).
    pub user_agent: String,
    /// Cache entry lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Interval between eager cache sweeps in seconds.
    pub cache_sweep_interval_secs: u64,
    /// Providers in the order they are tried.
    pub providers: Vec<ProviderConfig>,
}

impl GeocodingConfig {
    /// Cache entry lifetime.
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Interval between eager cache sweeps.
    pub const fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            region_qualifier: "RS, Brasil".to_owned(),
            user_agent: concat!("courier-tracker/", env!("CARGO_PKG_VERSION")).to_owned(),
            cache_ttl_secs: 24 * 60 * 60,
            cache_sweep_interval_secs: 6 * 60 * 60,
            providers: vec![
                ProviderConfig::nominatim(),
                ProviderConfig::openrouteservice(),
            ],
        }
    }
}

/// Routing section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// `OpenRouteService` base URL.
    pub base_url: String,
    /// `OpenRouteService` API key.
    pub api_key: String,
    /// Directions profile (e.g. `driving-car`).
    pub profile: String,
    /// Deadline for the single directions call in milliseconds.
    pub timeout_ms: u64,
}

impl RoutingConfig {
    /// Deadline for the directions call.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENROUTESERVICE_URL.to_owned(),
            api_key: String::new(),
            profile: "driving-car".to_owned(),
            timeout_ms: 15_000,
        }
    }
}
