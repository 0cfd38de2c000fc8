//! Configuration loading and typed config structures for the tracker.
//!
//! The canonical configuration lives in `courier-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure and a loader that reads it, applies environment
//! overrides, and validates the result.

use std::path::Path;
use std::time::Duration;

use courier_geo::{GeocodingConfig, ProviderKind, RoutingConfig};
use courier_types::Coordinate;
use serde::Deserialize;

use crate::server::ServerConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level tracker configuration.
///
/// Mirrors the structure of `courier-config.yaml`. Every section has
/// defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CourierConfig {
    /// HTTP bind address.
    #[serde(default)]
    pub server: ServerConfig,

    /// Geocoding providers and cache policy.
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Routing provider.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Driver presence staleness policy.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Delivery request business rules.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CourierConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values; see
    /// [`CourierConfig::apply_overrides`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    /// Environment overrides apply in both cases.
    ///
    /// # Errors
    ///
    /// Same as [`CourierConfig::from_file`], except a missing file is not
    /// an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`:
    ///
    /// - `COURIER_HOST` overrides `server.host`
    /// - `COURIER_PORT` (or `PORT`) overrides `server.port`
    /// - `ORS_API_KEY` sets the key on `routing` and every
    ///   `OpenRouteService` geocoding provider
    /// - `NOMINATIM_URL` overrides the base URL of Nominatim providers
    /// - `OPENROUTESERVICE_URL` overrides `OpenRouteService` base URLs
    ///
    /// Unparseable ports are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("COURIER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("COURIER_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|p| p.trim().parse().ok())
        {
            self.server.port = port;
        }

        let ors_key = lookup("ORS_API_KEY");
        let nominatim_url = lookup("NOMINATIM_URL");
        let ors_url = lookup("OPENROUTESERVICE_URL");

        for provider in &mut self.geocoding.providers {
            match provider.kind {
                ProviderKind::Nominatim => {
                    if let Some(url) = &nominatim_url {
                        provider.base_url = Some(url.clone());
                    }
                }
                ProviderKind::OpenRouteService => {
                    if let Some(key) = &ors_key {
                        provider.api_key.clone_from(key);
                    }
                    if let Some(url) = &ors_url {
                        provider.base_url = Some(url.clone());
                    }
                }
            }
        }

        if let Some(key) = ors_key {
            self.routing.api_key = key;
        }
        if let Some(url) = ors_url {
            self.routing.base_url = url;
        }
    }

    /// Reject configurations the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geocoding.providers.is_empty() {
            return Err(ConfigError::Invalid(
                "geocoding.providers must list at least one provider".to_owned(),
            ));
        }
        if !self.delivery.default_origin.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "delivery.default_origin out of range: {:?}",
                self.delivery.default_origin
            )));
        }
        if !(self.delivery.max_distance_meters.is_finite()
            && self.delivery.max_distance_meters > 0.0)
        {
            return Err(ConfigError::Invalid(
                "delivery.max_distance_meters must be positive".to_owned(),
            ));
        }
        if self.presence.sweep_interval_secs == 0 || self.geocoding.cache_sweep_interval_secs == 0
        {
            return Err(ConfigError::Invalid(
                "sweep intervals must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Driver presence staleness policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// A position older than this many seconds is stale.
    pub stale_after_secs: u64,
    /// Seconds between staleness sweeps.
    pub sweep_interval_secs: u64,
}

impl PresenceConfig {
    /// Staleness threshold.
    pub const fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Interval between staleness sweeps.
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 5 * 60,
            sweep_interval_secs: 60,
        }
    }
}

/// Delivery request business rules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Straight-line distance above which a request is rejected without
    /// asking the routing provider.
    pub max_distance_meters: f64,
    /// Minimum address length (characters, after trimming).
    pub min_address_chars: usize,
    /// Routing origin used when no driver is reporting.
    pub default_origin: Coordinate,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_distance_meters: 100_000.0,
            min_address_chars: 5,
            // Porto Alegre city center.
            default_origin: Coordinate::new(-30.0346, -51.2177),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}
