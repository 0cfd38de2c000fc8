//! Periodic background sweeps.
//!
//! Two independent interval tasks run for the life of the process: one
//! evicts expired geocode cache entries, the other expires stale driver
//! positions. Neither runs inside a request.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::presence::StaleSweep;
use crate::state::AppState;

/// Handles for the spawned sweep tasks.
#[derive(Debug)]
pub struct Sweepers {
    /// Geocode cache eviction task.
    pub cache: JoinHandle<()>,
    /// Presence staleness task.
    pub presence: JoinHandle<()>,
}

impl Sweepers {
    /// Stop both tasks.
    pub fn abort(&self) {
        self.cache.abort();
        self.presence.abort();
    }
}

/// Spawn both sweep loops.
///
/// The first sweep of each loop runs one full interval after start.
pub fn spawn_sweepers(state: &Arc<AppState>, cache_interval: Duration) -> Sweepers {
    let presence_interval = state.presence_policy.sweep_interval();

    let cache_state = Arc::clone(state);
    let cache = tokio::spawn(async move {
        let mut ticker = interval_after(cache_interval);
        loop {
            ticker.tick().await;
            sweep_cache(&cache_state).await;
        }
    });

    let presence_state = Arc::clone(state);
    let presence = tokio::spawn(async move {
        let mut ticker = interval_after(presence_interval);
        loop {
            ticker.tick().await;
            sweep_presence(&presence_state).await;
        }
    });

    info!(
        cache_secs = cache_interval.as_secs(),
        presence_secs = presence_interval.as_secs(),
        "sweepers started"
    );
    Sweepers { cache, presence }
}

/// Evict expired cache entries once. Returns how many were removed.
pub async fn sweep_cache(state: &AppState) -> usize {
    let removed = state.resolver.cache().sweep_expired().await;
    if removed > 0 {
        info!(removed, "expired geocode entries evicted");
    } else {
        debug!("geocode cache sweep found nothing to evict");
    }
    removed
}

/// Expire stale driver positions once.
pub async fn sweep_presence(state: &AppState) -> StaleSweep {
    let max_age = state.presence_policy.stale_after();
    let sweep = state.presence.write().await.sweep_stale(max_age);
    if sweep.active_cleared {
        info!(
            max_age_secs = max_age.as_secs(),
            "active driver position went stale, origin cleared"
        );
    }
    if sweep.agents_marked_stale > 0 {
        debug!(count = sweep.agents_marked_stale, "drivers marked stale");
    }
    sweep
}

fn interval_after(period: Duration) -> time::Interval {
    let period = period.max(Duration::from_millis(1));
    let start = time::Instant::now().checked_add(period).unwrap_or_else(time::Instant::now);
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use courier_geo::{GeocodeResolver, RouteCalculator};
    use courier_types::{ConnectionId, Coordinate, PositionReport, ResolvedAddress};

    use super::*;
    use crate::config::CourierConfig;

    fn state(config: CourierConfig) -> Arc<AppState> {
        let client = reqwest::Client::new();
        Arc::new(AppState::new(
            GeocodeResolver::from_config(&config.geocoding, &client),
            RouteCalculator::new(config.routing, client),
            config.delivery,
            config.presence,
        ))
    }

    #[tokio::test]
    async fn presence_sweep_uses_configured_threshold() {
        let mut config = CourierConfig::default();
        config.presence.stale_after_secs = 0;
        let state = state(config);

        let id = ConnectionId::new();
        let report = PositionReport {
            lat: -30.0346,
            lon: -51.2177,
            accuracy: None,
            timestamp: None,
        };
        state.presence.write().await.update(id, &report);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sweep = sweep_presence(&state).await;
        assert!(sweep.active_cleared);
        assert!(state.presence.read().await.active().is_none());
    }

    #[tokio::test]
    async fn cache_sweep_keeps_fresh_entries() {
        let state = state(CourierConfig::default());
        state
            .resolver
            .cache()
            .put(
                "nominatim:rua a".to_owned(),
                ResolvedAddress::new(Coordinate::new(-30.0, -51.0), "Rua A"),
            )
            .await;
        assert_eq!(sweep_cache(&state).await, 0);
        assert_eq!(state.resolver.cache().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_presence_loop_fires_after_one_interval() {
        let mut config = CourierConfig::default();
        config.presence.sweep_interval_secs = 60;
        let state = state(config);
        let sweepers = spawn_sweepers(&state, Duration::from_secs(3600));

        // Nothing registered; the loop just has to keep running.
        time::advance(Duration::from_secs(61)).await;
        assert!(!sweepers.presence.is_finished());
        sweepers.abort();
    }
}
