//! Proximity query shaping.
//!
//! Pure functions that turn "within N miles of a point, plus some
//! membership filters" into a store pipeline. Nothing here touches the
//! store, so every query shape can be checked without a database.
//!
//! Distances are converted to an angular radius by dividing by the
//! Earth's mean radius in miles. The constant is fixed; it is part of the
//! matching contract, not a tuning knob.

use serde_json::Value;

use super::GeoPoint;
use crate::store::{Filter, Stage};

/// Mean radius of the Earth in miles.
pub const EARTH_RADIUS_MILES: f64 = 3963.2;

/// Converts a distance in miles to radians on the sphere.
///
/// # Examples
///
/// ```
/// use beacon_core::geo::proximity::{angular_radius, EARTH_RADIUS_MILES};
///
/// assert_eq!(angular_radius(EARTH_RADIUS_MILES), 1.0);
/// ```
#[must_use]
pub fn angular_radius(miles: f64) -> f64 {
    miles / EARTH_RADIUS_MILES
}

/// Builder for a proximity pipeline.
///
/// Stages are emitted in the order the builder methods are called.
/// Filter order does not change the result set, but `limit` only caps
/// what the earlier stages let through, so it normally comes last.
#[derive(Debug, Clone, Default)]
pub struct ProximityQuery {
    stages: Vec<Stage>,
}

impl ProximityQuery {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps documents whose `field` lies within `miles` of `center`.
    #[must_use]
    pub fn near(mut self, field: &str, center: GeoPoint, miles: f64) -> Self {
        self.stages.push(Stage::Match(Filter::WithinSphere {
            field: field.to_string(),
            center,
            radius: angular_radius(miles),
        }));
        self
    }

    /// Keeps documents whose `field` is one of `values`.
    #[must_use]
    pub fn include(mut self, field: &str, values: &[String]) -> Self {
        self.stages
            .push(Stage::Match(Filter::In(field.to_string(), to_values(values))));
        self
    }

    /// Drops documents whose `field` is (or contains) one of `values`.
    #[must_use]
    pub fn exclude(mut self, field: &str, values: &[String]) -> Self {
        self.stages
            .push(Stage::Match(Filter::NotIn(field.to_string(), to_values(values))));
        self
    }

    /// Keeps documents whose array `field` shares at least one tag with
    /// `tags`.
    #[must_use]
    pub fn with_any_tag(self, field: &str, tags: &[String]) -> Self {
        self.include(field, tags)
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, max: usize) -> Self {
        self.stages.push(Stage::Limit(max));
        self
    }

    /// Finishes the query.
    #[must_use]
    pub fn into_pipeline(self) -> Vec<Stage> {
        self.stages
    }
}

fn to_values(values: &[String]) -> Vec<Value> {
    values.iter().cloned().map(Value::String).collect()
}

/// Users near `center` who have not been notified yet.
#[must_use]
pub fn nearby_users(center: GeoPoint, miles: f64, notified: &[String]) -> Vec<Stage> {
    ProximityQuery::new()
        .near("lastLocation", center, miles)
        .exclude("username", notified)
        .into_pipeline()
}

/// Like [`nearby_users`], restricted to a chosen candidate set.
///
/// The candidate set is applied first, then distance, then the
/// already-notified exclusion.
#[must_use]
pub fn private_nearby_users(
    center: GeoPoint,
    miles: f64,
    notified: &[String],
    selected: &[String],
) -> Vec<Stage> {
    ProximityQuery::new()
        .include("username", selected)
        .near("lastLocation", center, miles)
        .exclude("username", notified)
        .into_pipeline()
}

/// At most `max` beacons near `center`.
#[must_use]
pub fn nearby_beacons(max: usize, center: GeoPoint, miles: f64) -> Vec<Stage> {
    ProximityQuery::new()
        .near("location", center, miles)
        .limit(max)
        .into_pipeline()
}

/// At most `max` beacons near `center` carrying any of `tags`.
#[must_use]
pub fn nearby_beacons_by_tags(max: usize, center: GeoPoint, miles: f64, tags: &[String]) -> Vec<Stage> {
    ProximityQuery::new()
        .near("location", center, miles)
        .with_any_tag("tags", tags)
        .limit(max)
        .into_pipeline()
}

/// At most `max` beacons near `center` that `username` is not already
/// notified about.
#[must_use]
pub fn nearby_beacons_without_user(max: usize, center: GeoPoint, miles: f64, username: &str) -> Vec<Stage> {
    ProximityQuery::new()
        .near("location", center, miles)
        .exclude("notified", &[username.to_string()])
        .limit(max)
        .into_pipeline()
}
