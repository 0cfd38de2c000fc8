//! Geographic primitives: coordinates, resolved addresses, and
//! great-circle distance.
//!
//! Canonical order everywhere inside the tracker is `(lat, lon)`.
//! Providers that speak GeoJSON use `[lon, lat]`; the only place that
//! order is accepted is [`Coordinate::from_lon_lat`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Reasons a coordinate is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    /// The payload was not a JSON object or a field was missing.
    #[error("missing field: {0}")]
    Missing(&'static str),

    /// A field was present but not a JSON number.
    #[error("field is not numeric: {0}")]
    NotNumeric(&'static str),

    /// A field was numeric but outside its valid range (or not finite).
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Name of the offending field (`lat` or `lon`).
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinate {
    /// Latitude in `[-90, 90]`.
    pub lat: f64,
    /// Longitude in `[-180, 180]`.
    pub lon: f64,
}

impl Coordinate {
    /// Build a coordinate without validation.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn validated(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::OutOfRange {
                field: "lat",
                value: lat,
            });
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::OutOfRange {
                field: "lon",
                value: lon,
            });
        }
        Ok(Self { lat, lon })
    }

    /// Whether both fields are finite and within range.
    pub fn is_valid(&self) -> bool {
        Self::validated(self.lat, self.lon).is_ok()
    }

    /// Parse a loosely-typed JSON value of the form `{"lat": n, "lon": n}`.
    ///
    /// Strings that merely look like numbers are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoordinateError> {
        let lat = numeric_field(value, "lat")?;
        let lon = numeric_field(value, "lon")?;
        Self::validated(lat, lon)
    }

    /// Convert a GeoJSON position (`[lon, lat, ...]`) into canonical order.
    pub fn from_lon_lat(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat, ..] => Self::validated(*lat, *lon).ok(),
            _ => None,
        }
    }

    /// Emit this coordinate as a GeoJSON position (`[lon, lat]`).
    pub const fn to_lon_lat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn haversine_meters(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_METERS * c
    }
}

fn numeric_field(value: &serde_json::Value, field: &'static str) -> Result<f64, CoordinateError> {
    let raw = value.get(field).ok_or(CoordinateError::Missing(field))?;
    raw.as_f64().ok_or(CoordinateError::NotNumeric(field))
}

/// A geocoded address: where it is and how a provider named it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    /// Resolved location.
    pub coordinate: Coordinate,
    /// Human-readable canonical label returned by the provider.
    pub label: String,
}

impl ResolvedAddress {
    /// Create a resolved address.
    pub fn new(coordinate: Coordinate, label: impl Into<String>) -> Self {
        Self {
            coordinate,
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_range_boundaries() {
        for (lat, lon) in [
            (90.0, 180.0),
            (-90.0, -180.0),
            (0.0, 0.0),
            (-30.0346, -51.2177),
        ] {
            assert!(Coordinate::validated(lat, lon).is_ok(), "{lat},{lon}");
        }
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(Coordinate::validated(90.0001, 0.0).is_err());
        assert!(Coordinate::validated(0.0, -180.5).is_err());
        assert!(Coordinate::validated(f64::NAN, 0.0).is_err());
        assert!(Coordinate::validated(0.0, f64::INFINITY).is_err());
        assert!(!Coordinate::new(120.0, 10.0).is_valid());
    }

    #[test]
    fn from_json_requires_numbers() {
        let ok = serde_json::json!({"lat": -30.05, "lon": -51.2});
        assert_eq!(
            Coordinate::from_json(&ok),
            Ok(Coordinate::new(-30.05, -51.2))
        );

        let stringly = serde_json::json!({"lat": "-30.05", "lon": -51.2});
        assert_eq!(
            Coordinate::from_json(&stringly),
            Err(CoordinateError::NotNumeric("lat"))
        );

        let missing = serde_json::json!({"lat": -30.05});
        assert_eq!(
            Coordinate::from_json(&missing),
            Err(CoordinateError::Missing("lon"))
        );

        let not_object = serde_json::json!([1.0, 2.0]);
        assert!(Coordinate::from_json(&not_object).is_err());
    }

    #[test]
    fn lon_lat_is_transposed() {
        let c = Coordinate::from_lon_lat(&[-51.2, -30.05]);
        assert_eq!(c, Some(Coordinate::new(-30.05, -51.2)));
        assert_eq!(Coordinate::new(-30.05, -51.2).to_lon_lat(), [-51.2, -30.05]);
        assert_eq!(Coordinate::from_lon_lat(&[1.0]), None);
    }

    #[test]
    fn haversine_known_distance() {
        // One degree of latitude along a meridian.
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * 1.0_f64.to_radians();
        assert!((a.haversine_meters(&b) - expected).abs() < 1e-6);
        assert!(a.haversine_meters(&a).abs() < f64::EPSILON);
    }

    #[test]
    fn haversine_is_symmetric() {
        let poa = Coordinate::new(-30.0346, -51.2177);
        let dest = Coordinate::new(-30.05, -51.20);
        let d1 = poa.haversine_meters(&dest);
        let d2 = dest.haversine_meters(&poa);
        assert!((d1 - d2).abs() < 1e-6);
        assert!(d1 > 2_000.0 && d1 < 3_000.0);
    }
}
