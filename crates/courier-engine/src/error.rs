//! Error types for the tracker binary.

/// Top-level error for the tracker binary.
///
/// Each variant wraps a startup or serving failure so `main` can
/// propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: courier_server::ConfigError,
    },

    /// The HTTP server failed to start or stopped with an error.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: courier_server::ServerError,
    },
}
