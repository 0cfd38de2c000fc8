//! Driver presence registry.
//!
//! Tracks every connection that has identified itself as a driver and the
//! single *active* position used as the routing origin. The active position
//! is last-writer-wins across all drivers; it records the owning
//! connection so a disconnect only clears it when the owner leaves.
//!
//! Per-driver lifecycle:
//!
//! ```text
//! Connected --valid report--> Reporting --no report for max_age--> Stale
//!     ^                          |   ^                              |
//!     |                          |   +-------- valid report --------+
//!     +--------------------------+--> remove() (entry deleted)
//! ```
//!
//! The registry is plain data; callers wrap it in a lock (see
//! [`AppState`](crate::state::AppState)).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use courier_types::{ConnectionId, Coordinate, PositionBroadcast, PositionReport};
use tracing::{debug, info, warn};

/// Where a driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    /// Identified as a driver, no valid position yet.
    Connected,
    /// Has a fresh position.
    Reporting,
    /// Position expired; waiting for a new report.
    Stale,
}

/// A validated driver position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentPosition {
    /// Validated coordinate.
    pub coordinate: Coordinate,
    /// Reported accuracy in meters, if any.
    pub accuracy: Option<f64>,
    /// Connection that reported it.
    pub connection_id: ConnectionId,
    /// Epoch milliseconds: the client's value, or server receipt time.
    pub timestamp: i64,
    /// Server receipt time, used for staleness.
    pub received_at: DateTime<Utc>,
}

impl AgentPosition {
    /// Trimmed payload fanned out to observers.
    pub const fn to_broadcast(&self) -> PositionBroadcast {
        PositionBroadcast {
            lat: self.coordinate.lat,
            lon: self.coordinate.lon,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone)]
struct AgentEntry {
    state: PresenceState,
    position: Option<AgentPosition>,
    last_update: DateTime<Utc>,
}

/// Outcome of a staleness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaleSweep {
    /// Whether the active position was cleared.
    pub active_cleared: bool,
    /// Drivers moved to [`PresenceState::Stale`] by this sweep.
    pub agents_marked_stale: usize,
}

/// Registry of driver connections and the active position.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    agents: HashMap<ConnectionId, AgentEntry>,
    active: Option<AgentPosition>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as a driver. Idempotent.
    pub fn register(&mut self, id: ConnectionId) {
        self.register_at(id, Utc::now());
    }

    /// [`register`](Self::register) with an explicit clock.
    pub fn register_at(&mut self, id: ConnectionId, now: DateTime<Utc>) {
        if self.agents.contains_key(&id) {
            return;
        }
        self.agents.insert(
            id,
            AgentEntry {
                state: PresenceState::Connected,
                position: None,
                last_update: now,
            },
        );
        debug!(connection = %id, "driver registered");
    }

    /// Validate and store a position report from `id`, making it the
    /// active position.
    ///
    /// Returns the stored position, or `None` if the report was rejected
    /// (the registry is left unchanged).
    pub fn update(&mut self, id: ConnectionId, report: &PositionReport) -> Option<AgentPosition> {
        self.update_at(id, report, Utc::now())
    }

    /// [`update`](Self::update) with an explicit clock.
    pub fn update_at(
        &mut self,
        id: ConnectionId,
        report: &PositionReport,
        now: DateTime<Utc>,
    ) -> Option<AgentPosition> {
        let coordinate = match Coordinate::validated(report.lat, report.lon) {
            Ok(c) => c,
            Err(e) => {
                warn!(connection = %id, error = %e, "rejected position report");
                return None;
            }
        };
        if report
            .accuracy
            .is_some_and(|accuracy| !(accuracy.is_finite() && accuracy >= 0.0))
        {
            warn!(connection = %id, accuracy = ?report.accuracy, "rejected position report: bad accuracy");
            return None;
        }

        let position = AgentPosition {
            coordinate,
            accuracy: report.accuracy,
            connection_id: id,
            timestamp: report.timestamp.unwrap_or_else(|| now.timestamp_millis()),
            received_at: now,
        };

        let entry = self.agents.entry(id).or_insert(AgentEntry {
            state: PresenceState::Connected,
            position: None,
            last_update: now,
        });
        entry.state = PresenceState::Reporting;
        entry.position = Some(position);
        entry.last_update = now;
        self.active = Some(position);

        debug!(
            connection = %id,
            lat = coordinate.lat,
            lon = coordinate.lon,
            "driver position updated"
        );
        Some(position)
    }

    /// The current routing origin, if any driver is reporting.
    pub const fn active(&self) -> Option<AgentPosition> {
        self.active
    }

    /// Forget `id`. Clears the active position if `id` owns it.
    ///
    /// Returns whether `id` was a registered driver.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let existed = self.agents.remove(&id).is_some();
        if self.active.is_some_and(|p| p.connection_id == id) {
            self.active = None;
            info!(connection = %id, "active driver disconnected, origin cleared");
        }
        existed
    }

    /// Expire positions older than `max_age`.
    pub fn sweep_stale(&mut self, max_age: Duration) -> StaleSweep {
        self.sweep_stale_at(max_age, Utc::now())
    }

    /// [`sweep_stale`](Self::sweep_stale) with an explicit clock. An entry
    /// exactly `max_age` old is kept.
    pub fn sweep_stale_at(&mut self, max_age: Duration, now: DateTime<Utc>) -> StaleSweep {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let is_stale = |at: DateTime<Utc>| now.signed_duration_since(at) > max_age;

        let mut sweep = StaleSweep::default();
        if self.active.is_some_and(|p| is_stale(p.received_at)) {
            self.active = None;
            sweep.active_cleared = true;
        }

        for entry in self.agents.values_mut() {
            if entry.state == PresenceState::Reporting && is_stale(entry.last_update) {
                entry.state = PresenceState::Stale;
                entry.position = None;
                sweep.agents_marked_stale = sweep.agents_marked_stale.saturating_add(1);
            }
        }
        sweep
    }

    /// Number of registered drivers.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Lifecycle state of `id`, if registered.
    pub fn state_of(&self, id: ConnectionId) -> Option<PresenceState> {
        self.agents.get(&id).map(|e| e.state)
    }

    /// Last accepted position of `id`, if it has a fresh one.
    pub fn position_of(&self, id: ConnectionId) -> Option<AgentPosition> {
        self.agents.get(&id).and_then(|e| e.position)
    }
}
