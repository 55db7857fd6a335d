//! Beacon value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::geo::GeoPoint;

/// Range used when none is given, in miles.
pub const DEFAULT_RANGE_MILES: f64 = 0.1;

/// Parameters for a new beacon.
///
/// The creator is supplied separately, by [`Beacon::create`] or
/// [`crate::User::place_beacon`].
///
/// # Example
///
/// ```
/// use beacon_core::{GeoPoint, NewBeacon};
/// use chrono::{Duration, Utc};
///
/// let start = Utc::now();
/// let new = NewBeacon::new("Jam session", GeoPoint::new(40.0, -73.0).unwrap(), start, start + Duration::hours(2))
///     .with_range(5.0)
///     .with_tag("music");
/// assert_eq!(new.tags, ["music"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewBeacon {
    /// Display title.
    pub title: String,
    /// Where the beacon is placed.
    pub location: GeoPoint,
    /// Start of the active window.
    pub start_time: DateTime<Utc>,
    /// End of the active window.
    pub end_time: DateTime<Utc>,
    /// Notification radius in miles.
    pub range: f64,
    /// Human-readable place name.
    pub place_name: String,
    /// Street address.
    pub address: String,
    /// Topic tags, in order.
    pub tags: Vec<String>,
}

impl NewBeacon {
    /// Creates beacon parameters with the default range and no tags.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        location: GeoPoint,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            location,
            start_time,
            end_time,
            range: DEFAULT_RANGE_MILES,
            place_name: String::new(),
            address: String::new(),
            tags: Vec::new(),
        }
    }

    /// Sets the notification radius in miles.
    #[must_use]
    pub const fn with_range(mut self, range: f64) -> Self {
        self.range = range;
        self
    }

    /// Sets the place name.
    #[must_use]
    pub fn with_place_name(mut self, place_name: impl Into<String>) -> Self {
        self.place_name = place_name.into();
        self
    }

    /// Sets the street address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Appends a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A time-bounded, geolocated event owned by a creator.
///
/// A beacon is addressed in the store by `(creator, end_time)`. Times are
/// kept at millisecond precision, the precision they are stored with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beacon {
    pub(super) creator: String,
    pub(super) title: String,
    pub(super) location: GeoPoint,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub(super) start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub(super) end_time: DateTime<Utc>,
    pub(super) range: f64,
    #[serde(default)]
    pub(super) place_name: String,
    #[serde(default)]
    pub(super) address: String,
    #[serde(default)]
    pub(super) tags: Vec<String>,
    pub(super) notified_count: u64,
    #[serde(default)]
    pub(super) notified: Vec<String>,
}

/// Accepts finite ranges greater than zero.
pub(super) fn check_range(range: f64) -> Result<()> {
    if range.is_finite() && range > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidRange(range))
    }
}

/// Drops sub-millisecond precision.
pub(super) fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

impl Beacon {
    /// Builds a beacon in memory. Nothing is stored.
    ///
    /// The creator starts as the only notified user, with a count of 1.
    /// Window ordering is not checked; the range is checked on insert.
    #[must_use]
    pub fn create(creator: impl Into<String>, new: NewBeacon) -> Self {
        let creator = creator.into();
        Self {
            notified: vec![creator.clone()],
            notified_count: 1,
            creator,
            title: new.title,
            location: new.location,
            start_time: truncate_millis(new.start_time),
            end_time: truncate_millis(new.end_time),
            range: new.range,
            place_name: new.place_name,
            address: new.address,
            tags: new.tags,
        }
    }

    /// Whether the beacon has not yet ended at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.end_time > now
    }

    /// Whether `at` falls within `[start_time, end_time]`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_time <= at && at <= self.end_time
    }

    /// Username of the creator.
    #[must_use]
    pub fn creator(&self) -> &str {
        &self.creator
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Where the beacon is placed.
    #[must_use]
    pub const fn location(&self) -> GeoPoint {
        self.location
    }

    /// Start of the active window.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// End of the active window.
    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Notification radius in miles.
    #[must_use]
    pub const fn range(&self) -> f64 {
        self.range
    }

    /// Human-readable place name.
    #[must_use]
    pub fn place_name(&self) -> &str {
        &self.place_name
    }

    /// Street address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Topic tags, in order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// How many users have been notified.
    #[must_use]
    pub const fn notified_count(&self) -> u64 {
        self.notified_count
    }

    /// Usernames already notified, the creator included.
    #[must_use]
    pub fn notified(&self) -> &[String] {
        &self.notified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        (start, start + Duration::hours(3))
    }

    fn new_beacon() -> NewBeacon {
        let (start, end) = window();
        NewBeacon::new("Jam", GeoPoint::new(40.0, -73.0).unwrap(), start, end)
    }

    #[test]
    fn create_seeds_notified_with_creator() {
        let beacon = Beacon::create("alice", new_beacon());
        assert_eq!(beacon.creator(), "alice");
        assert_eq!(beacon.notified_count(), 1);
        assert_eq!(beacon.notified(), ["alice"]);
    }

    #[test]
    fn defaults() {
        let beacon = Beacon::create("alice", new_beacon());
        assert!((beacon.range() - DEFAULT_RANGE_MILES).abs() < f64::EPSILON);
        assert!(beacon.tags().is_empty());
        assert!(beacon.place_name().is_empty());
        assert!(beacon.address().is_empty());
    }

    #[test]
    fn builder_sets_fields() {
        let new = new_beacon()
            .with_range(5.0)
            .with_place_name("Hall")
            .with_address("1 Main St")
            .with_tag("music")
            .with_tag("jazz");
        let beacon = Beacon::create("alice", new);

        assert!((beacon.range() - 5.0).abs() < f64::EPSILON);
        assert_eq!(beacon.place_name(), "Hall");
        assert_eq!(beacon.address(), "1 Main St");
        assert_eq!(beacon.tags(), ["music", "jazz"]);
    }

    #[test]
    fn create_truncates_to_millis() {
        let (start, end) = window();
        let start = start + Duration::nanoseconds(1_234_567);
        let beacon = Beacon::create(
            "alice",
            NewBeacon::new("Jam", GeoPoint::new(0.0, 0.0).unwrap(), start, end),
        );
        assert_eq!(beacon.start_time().timestamp_subsec_nanos(), 1_000_000);
    }

    #[test]
    fn check_range_rejects_non_positive_and_non_finite() {
        assert!(check_range(0.1).is_ok());
        assert!(check_range(5000.0).is_ok());
        for bad in [0.0, -0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(
                matches!(check_range(bad), Err(CoreError::InvalidRange(_))),
                "range {bad} should be rejected"
            );
        }
    }

    #[test]
    fn activity_is_derived_from_end_time() {
        let (start, end) = window();
        let beacon = Beacon::create("alice", new_beacon());

        assert!(beacon.is_active_at(start));
        assert!(!beacon.is_active_at(end));
        assert!(beacon.contains(start));
        assert!(beacon.contains(end));
        assert!(!beacon.contains(end + Duration::milliseconds(1)));
    }

    #[test]
    fn serializes_times_as_epoch_millis() {
        let (start, _) = window();
        let beacon = Beacon::create("alice", new_beacon());
        let value = serde_json::to_value(&beacon).unwrap();

        assert_eq!(value["startTime"], start.timestamp_millis());
        assert_eq!(value["notifiedCount"], 1);
        assert_eq!(value["placeName"], "");
        assert_eq!(value["location"]["type"], "Point");

        let back: Beacon = serde_json::from_value(value).unwrap();
        assert_eq!(back, beacon);
    }
}
