//! Administrative HTTP handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness plus connection and cache counters |
//! | `DELETE` | `/api/cache` | Drop every geocode cache entry |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is answering.
    pub status: &'static str,
    /// Open realtime connections.
    pub connections: usize,
    /// Registered drivers.
    pub agents: usize,
    /// Whether a routing origin is currently known.
    pub active_agent: bool,
    /// Geocode cache entries, including expired ones not yet swept.
    pub cache_entries: usize,
}

/// Body of `DELETE /api/cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheCleared {
    /// Entries removed.
    pub cleared: usize,
}

/// Report liveness and counters.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (agents, active_agent) = {
        let presence = state.presence.read().await;
        (presence.agent_count(), presence.active().is_some())
    };
    Json(HealthResponse {
        status: "ok",
        connections: state.connection_count(),
        agents,
        active_agent,
        cache_entries: state.resolver.cache().len().await,
    })
}

/// Clear the geocode cache. Open connections are not affected.
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<CacheCleared> {
    let cleared = state.resolver.cache().clear().await;
    info!(cleared, "geocode cache cleared by operator");
    Json(CacheCleared { cleared })
}
