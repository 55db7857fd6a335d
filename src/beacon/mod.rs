//! Beacons: time-bounded, geolocated events.
//!
//! A beacon belongs to one creator, covers a time window, sits at a
//! location with a notification radius, and tracks which users have been
//! notified about it.
//!
//! # Lifecycle
//!
//! ```text
//! NoActiveBeacon ──insert──> Active
//! Active ──delete_beacon | delete_next_beacon | end time passes──> NoActiveBeacon
//! ```
//!
//! "Active" is never stored; it is derived from the end time when a query
//! runs.
//!
//! # Types
//!
//! - [`NewBeacon`]: parameters for a new beacon
//! - [`Beacon`]: a stored or storable beacon

mod lifecycle;
mod types;
mod updates;

pub use types::{Beacon, NewBeacon, DEFAULT_RANGE_MILES};

use crate::error::Result;
use crate::geo::{proximity, GeoPoint};
use crate::store::{Document, DocumentStore};

/// Collection holding beacon documents.
pub const BEACON_COLLECTION: &str = "beacons";

impl Beacon {
    /// At most `max` beacons within `radius_miles` of `center`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn find_nearby_beacons(
        store: &dyn DocumentStore,
        max: usize,
        center: GeoPoint,
        radius_miles: f64,
    ) -> Result<Vec<Document>> {
        let pipeline = proximity::nearby_beacons(max, center, radius_miles);
        Ok(store.aggregate(BEACON_COLLECTION, &pipeline)?)
    }

    /// Like [`Beacon::find_nearby_beacons`], keeping beacons that carry any
    /// of `tags`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn find_nearby_beacons_by_tags(
        store: &dyn DocumentStore,
        max: usize,
        center: GeoPoint,
        radius_miles: f64,
        tags: &[String],
    ) -> Result<Vec<Document>> {
        let pipeline = proximity::nearby_beacons_by_tags(max, center, radius_miles, tags);
        Ok(store.aggregate(BEACON_COLLECTION, &pipeline)?)
    }

    /// Like [`Beacon::find_nearby_beacons`], skipping beacons `username` has
    /// already been notified about.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn find_nearby_beacons_without_user(
        store: &dyn DocumentStore,
        max: usize,
        center: GeoPoint,
        radius_miles: f64,
        username: &str,
    ) -> Result<Vec<Document>> {
        let pipeline = proximity::nearby_beacons_without_user(max, center, radius_miles, username);
        Ok(store.aggregate(BEACON_COLLECTION, &pipeline)?)
    }
}
