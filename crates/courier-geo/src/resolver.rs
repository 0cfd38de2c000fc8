//! Multi-provider geocode resolver.
//!
//! The resolver walks an ordered list of [`ProviderStrategy`] values,
//! short-circuiting on the first success:
//!
//! ```text
//! cache (per provider) --> primary x3 (backoff) --> fallback x1 --> NotFound
//! ```
//!
//! Every attempt is bounded by the strategy's timeout. Concurrent
//! resolutions of the same address are not deduplicated; each caller that
//! misses the cache issues its own provider calls.

use std::sync::Arc;
use std::time::Duration;

use courier_types::ResolvedAddress;
use tracing::{debug, info, warn};

use crate::cache::{GeocodeCache, cache_key};
use crate::config::GeocodingConfig;
use crate::error::{GeocodeError, ProviderError};
use crate::provider::{GeocodeProvider, create_provider};

/// One provider plus the retry policy applied to it.
#[derive(Debug, Clone)]
pub struct ProviderStrategy {
    /// The backend to call.
    pub provider: GeocodeProvider,
    /// Attempts before giving up on this provider (at least one is made).
    pub attempts: u32,
    /// Deadline for each attempt.
    pub timeout: Duration,
    /// Backoff unit; the wait after failed attempt `n` is `n * backoff`.
    pub backoff: Duration,
}

impl ProviderStrategy {
    /// Wait after failed attempt `attempt` (1-based) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Resolves free-text addresses to coordinates with caching and fallback.
#[derive(Debug)]
pub struct GeocodeResolver {
    strategies: Vec<ProviderStrategy>,
    cache: Arc<GeocodeCache>,
    region_qualifier: String,
}

impl GeocodeResolver {
    /// Create a resolver over `strategies`, tried in order.
    pub fn new(
        strategies: Vec<ProviderStrategy>,
        cache: Arc<GeocodeCache>,
        region_qualifier: impl Into<String>,
    ) -> Self {
        Self {
            strategies,
            cache,
            region_qualifier: region_qualifier.into(),
        }
    }

    /// Build a resolver and its cache from the `geocoding` config section.
    pub fn from_config(config: &GeocodingConfig, client: &reqwest::Client) -> Self {
        let strategies = config
            .providers
            .iter()
            .map(|provider| ProviderStrategy {
                provider: create_provider(provider, client.clone()),
                attempts: provider.attempts,
                timeout: provider.timeout(),
                backoff: provider.backoff(),
            })
            .collect();

        Self::new(
            strategies,
            Arc::new(GeocodeCache::new(config.cache_ttl())),
            config.region_qualifier.clone(),
        )
    }

    /// The cache shared with the periodic sweeper and admin endpoints.
    pub const fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    /// Names of the configured providers, in fallback order.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.provider.name()).collect()
    }

    /// Trim `address` and append the region qualifier unless it is
    /// already present (case-insensitive).
    pub fn normalize(&self, address: &str) -> String {
        let trimmed = address.trim();
        let qualifier = self.region_qualifier.trim();
        if qualifier.is_empty()
            || trimmed
                .to_lowercase()
                .contains(&qualifier.to_lowercase())
        {
            trimmed.to_owned()
        } else {
            format!("{trimmed}, {qualifier}")
        }
    }

    /// Resolve `address`, consulting the cache before any provider.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::NotFound`] when every provider failed.
    /// Provider details are logged, never returned.
    pub async fn resolve(&self, address: &str) -> Result<ResolvedAddress, GeocodeError> {
        let query = self.normalize(address);

        for strategy in &self.strategies {
            let key = cache_key(strategy.provider.name(), &query);
            if let Some(hit) = self.cache.get(&key).await {
                debug!(key, "geocode cache hit");
                return Ok(hit);
            }
        }

        for strategy in &self.strategies {
            let provider = strategy.provider.name();
            match self.run_strategy(strategy, &query).await {
                Ok(resolved) => {
                    info!(
                        provider,
                        query,
                        lat = resolved.coordinate.lat,
                        lon = resolved.coordinate.lon,
                        "address resolved"
                    );
                    self.cache
                        .put(cache_key(provider, &query), resolved.clone())
                        .await;
                    return Ok(resolved);
                }
                Err(e) => {
                    warn!(provider, query, error = %e, "provider exhausted, trying next");
                }
            }
        }

        warn!(query, "all geocoding providers failed");
        Err(GeocodeError::NotFound)
    }

    /// Run one strategy's attempt loop.
    async fn run_strategy(
        &self,
        strategy: &ProviderStrategy,
        query: &str,
    ) -> Result<ResolvedAddress, ProviderError> {
        let attempts = strategy.attempts.max(1);
        let mut attempt: u32 = 1;
        loop {
            match strategy.provider.attempt(query, strategy.timeout).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) => {
                    warn!(
                        provider = strategy.provider.name(),
                        attempt,
                        attempts,
                        error = %e,
                        "geocode attempt failed"
                    );
                    if attempt >= attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(strategy.delay_after(attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
