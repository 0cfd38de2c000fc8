//! Axum router construction.
//!
//! Assembles the realtime `WebSocket` route and the administrative
//! endpoints into a single [`Router`] with CORS enabled for the web
//! client.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::not_found;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /ws` -- realtime channel
/// - `GET /health` -- liveness and counters
/// - `DELETE /api/cache` -- clear the geocode cache
///
/// Anything else answers `404` with a JSON body.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::ws_channel))
        .route("/health", get(handlers::health))
        .route("/api/cache", delete(handlers::clear_cache))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
