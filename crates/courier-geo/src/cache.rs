//! In-memory geocode cache with time-based expiry.
//!
//! Entries are keyed by `provider:normalized-address` because providers
//! return different canonical labels for the same input. Entries are
//! immutable once stored and expire after a fixed TTL: reads treat an
//! expired entry as a miss, and [`GeocodeCache::sweep_expired`] removes
//! them eagerly on a timer.
//!
//! There is no size-based eviction. Growth is bounded only by the number
//! of distinct addresses requested within one TTL window, which is an
//! accepted scaling limit for a single-city deployment.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use courier_types::ResolvedAddress;
use tokio::sync::RwLock;
use tracing::debug;

/// Build the cache key for `address` as resolved by `provider`.
///
/// The address is trimmed and lowercased.
pub fn cache_key(provider: &str, address: &str) -> String {
    format!("{provider}:{}", address.trim().to_lowercase())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    resolved: ResolvedAddress,
    stored_at: DateTime<Utc>,
}

/// TTL-bounded map from cache key to [`ResolvedAddress`].
#[derive(Debug)]
pub struct GeocodeCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: TimeDelta,
}

impl GeocodeCache {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Look up `key`, treating entries older than the TTL as absent.
    pub async fn get(&self, key: &str) -> Option<ResolvedAddress> {
        self.get_at(key, Utc::now()).await
    }

    /// [`Self::get`] evaluated at an explicit instant.
    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<ResolvedAddress> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if self.is_expired(entry, now) {
            debug!(key, "geocode cache entry expired");
            return None;
        }
        Some(entry.resolved.clone())
    }

    /// Store `resolved` under `key`, replacing any previous entry.
    pub async fn put(&self, key: String, resolved: ResolvedAddress) {
        self.put_at(key, resolved, Utc::now()).await;
    }

    /// [`Self::put`] with an explicit storage instant.
    pub async fn put_at(&self, key: String, resolved: ResolvedAddress, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        let _ = entries.insert(
            key,
            CacheEntry {
                resolved,
                stored_at: now,
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    /// [`Self::sweep_expired`] evaluated at an explicit instant.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(entries.len())
    }

    /// Drop all entries. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) > self.ttl
    }
}
