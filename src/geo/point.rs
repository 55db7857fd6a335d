//! Geographic point value type.
//!
//! A [`GeoPoint`] is an immutable (longitude, latitude) pair. It is
//! persisted as a GeoJSON `Point` so documents stay readable by any
//! GeoJSON-aware tool:
//!
//! ```json
//! { "type": "Point", "coordinates": [-73.600491, 40.714087] }
//! ```
//!
//! Longitude comes first, matching the GeoJSON coordinate order.

use serde::{Deserialize, Serialize};

use super::proximity::EARTH_RADIUS_MILES;
use crate::error::CoreError;

/// An immutable geographic coordinate.
///
/// Construction validates the ranges, so every `GeoPoint` in the system
/// satisfies longitude in [-180, 180] and latitude in [-90, 90].
///
/// # Example
///
/// ```
/// use beacon_core::geo::GeoPoint;
///
/// let hofstra = GeoPoint::new(-73.600_491, 40.714_087).unwrap();
/// assert_eq!(hofstra.longitude(), -73.600_491);
/// assert!(GeoPoint::new(181.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    /// Creates a validated point.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLocation`] if either coordinate is not
    /// finite or lies outside its valid range.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, CoreError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::InvalidLocation(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::InvalidLocation(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Great-circle distance to `other` in radians (haversine).
    #[must_use]
    pub fn angular_distance(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * a.sqrt().min(1.0).asin()
    }

    /// Great-circle distance to `other` in miles.
    #[must_use]
    pub fn distance_miles(&self, other: &Self) -> f64 {
        self.angular_distance(other) * EARTH_RADIUS_MILES
    }
}

/// GeoJSON wire form of a point.
#[derive(Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = CoreError;

    fn try_from(value: GeoJsonPoint) -> Result<Self, Self::Error> {
        if value.kind != "Point" {
            return Err(CoreError::InvalidLocation(format!(
                "expected GeoJSON Point, got {}",
                value.kind
            )));
        }
        let [longitude, latitude] = value.coordinates;
        Self::new(longitude, latitude)
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [point.longitude, point.latitude],
        }
    }
}
