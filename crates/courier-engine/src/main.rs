//! Courier tracker binary.
//!
//! Wires configuration, logging, shared state, background sweepers, and
//! the HTTP/WebSocket server together.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$COURIER_CONFIG` (default
//!    `courier-config.yaml`), falling back to defaults plus environment
//! 2. Initialize structured logging (tracing)
//! 3. Install a panic hook that reports through tracing
//! 4. Build shared state (HTTP client, resolver, route calculator)
//! 5. Spawn the cache and presence sweepers
//! 6. Serve until Ctrl-C or SIGTERM, then shut down gracefully

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use courier_server::{AppState, CourierConfig, LoggingConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const DEFAULT_CONFIG_PATH: &str = "courier-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the address cannot be
/// bound, or the server fails while serving.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let path = config_path(std::env::var("COURIER_CONFIG").ok());
    let config = CourierConfig::load(&path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        path = %path.display(),
        host = config.server.host,
        port = config.server.port,
        providers = config.geocoding.providers.len(),
        "configuration loaded"
    );
    if config.routing.api_key.is_empty() {
        warn!("ORS_API_KEY is not set; routing and the fallback geocoder will be rejected");
    }

    // 3. Panics are logged, not just printed.
    std::panic::set_hook(Box::new(|panic| {
        error!(panic = %panic, "task panicked");
    }));

    // 4. Shared state.
    let state = Arc::new(AppState::from_config(&config)?);

    // 5. Background sweepers.
    let sweepers = courier_server::spawn_sweepers(&state, config.geocoding.cache_sweep_interval());

    // 6. Serve.
    let result = courier_server::start_server(&config.server, state, shutdown_signal()).await;
    sweepers.abort();
    result?;

    info!("courier-engine stopped");
    Ok(())
}

fn config_path(from_env: Option<String>) -> PathBuf {
    from_env
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received, draining connections");
}
