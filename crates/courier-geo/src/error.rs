//! Error types for the geocoding and routing pipeline.
//!
//! Provider-level failures ([`ProviderError`]) stay inside this crate: the
//! resolver and route calculator translate them into [`GeocodeError`] and
//! [`RouteError`], which never carry raw transport text to end users.

/// A single call to an external provider failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The call did not complete within its deadline.
    #[error("{provider} timed out after {timeout_ms} ms")]
    Timeout {
        /// Provider name.
        provider: &'static str,
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },

    /// The request could not be sent or the connection failed.
    #[error("{provider} request failed: {message}")]
    Transport {
        /// Provider name.
        provider: &'static str,
        /// Transport error text (log only).
        message: String,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("{provider} returned HTTP {status}")]
    Status {
        /// Provider name.
        provider: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The provider answered successfully but with no results.
    #[error("{provider} returned no results")]
    EmptyResult {
        /// Provider name.
        provider: &'static str,
    },

    /// The response body did not have the documented shape.
    #[error("{provider} response malformed: {message}")]
    Malformed {
        /// Provider name.
        provider: &'static str,
        /// What was wrong with the body.
        message: String,
    },
}

/// Every geocoding provider failed for an address.
///
/// Carries no detail; which provider failed and why is logged at the
/// resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeError {
    /// No provider could resolve the address.
    #[error("address not found")]
    NotFound,
}

/// The routing provider could not produce a usable route.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    /// Origin or destination failed the range check.
    #[error("invalid route coordinate")]
    InvalidCoordinate,

    /// The provider answered but returned no route.
    #[error("no route found")]
    NoRoute,

    /// The provider call itself failed.
    #[error("routing provider failed: {0}")]
    Provider(#[from] ProviderError),
}
