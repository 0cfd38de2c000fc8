//! Geocoding and routing pipeline for the courier tracker.
//!
//! # Architecture
//!
//! ```text
//! address --> GeocodeResolver --(cache miss)--> [Nominatim x3] --> [ORS x1]
//!                  |                                  |
//!                  +------- GeocodeCache <------------+
//!
//! (origin, destination) --> RouteCalculator --> ORS directions (GeoJSON)
//! ```
//!
//! Provider-level failures are translated at the resolver and calculator
//! boundary: callers only ever see [`GeocodeError`] or [`RouteError`].

pub mod cache;
pub mod config;
pub mod error;
pub mod provider;
pub mod resolver;
pub mod route;

pub use cache::{GeocodeCache, cache_key};
pub use config::{GeocodingConfig, ProviderConfig, ProviderKind, RoutingConfig};
pub use error::{GeocodeError, ProviderError, RouteError};
pub use provider::{GeocodeProvider, NominatimProvider, OrsGeocodeProvider, create_provider};
pub use resolver::{GeocodeResolver, ProviderStrategy};
pub use route::{RouteCalculator, RouteResult};
