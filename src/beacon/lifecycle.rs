//! Inserting, finding, reloading, and deleting beacons.
//!
//! These operations carry the one-active-beacon rule: a creator may hold
//! at most one beacon whose end time is still in the future. The rule is
//! checked and the beacon written in a single conditional insert.

use chrono::{DateTime, Utc};
use tracing::info;

use super::types::check_range;
use super::{Beacon, BEACON_COLLECTION};
use crate::error::{CoreError, Result};
use crate::store::{from_document, to_document, Document, DocumentStore, Filter};

/// Beacons of `creator` that have not ended at `now`.
fn active_for(creator: &str, now: DateTime<Utc>) -> Filter {
    Filter::And(vec![
        Filter::eq("creator", creator),
        Filter::gt("endTime", now.timestamp_millis()),
    ])
}

/// Beacons of `creator` whose window contains `at`.
fn containing(creator: &str, at: DateTime<Utc>) -> Filter {
    let at = at.timestamp_millis();
    Filter::And(vec![
        Filter::eq("creator", creator),
        Filter::lte("startTime", at),
        Filter::gte("endTime", at),
    ])
}

impl Beacon {
    /// Filter addressing this beacon by `(creator, end_time)`.
    pub(super) fn key(&self) -> Filter {
        Filter::And(vec![
            Filter::eq("creator", self.creator.as_str()),
            Filter::eq("endTime", self.end_time.timestamp_millis()),
        ])
    }

    /// Stores this beacon, enforcing one active beacon per creator.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ActiveBeaconExists`] if the creator already has
    /// a beacon that has not ended.
    pub fn insert(&self, store: &dyn DocumentStore) -> Result<()> {
        self.insert_at(store, Utc::now())
    }

    /// [`Beacon::insert`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidRange`] if the range is not finite and positive
    /// - [`CoreError::ActiveBeaconExists`] if the creator has a beacon
    ///   ending after `now`
    pub fn insert_at(&self, store: &dyn DocumentStore, now: DateTime<Utc>) -> Result<()> {
        check_range(self.range)?;
        let doc = to_document(self)?;
        if !store.insert_unless(BEACON_COLLECTION, &active_for(&self.creator, now), doc)? {
            return Err(CoreError::ActiveBeaconExists(self.creator.clone()));
        }

        info!("Inserted beacon for {} ending {}", self.creator, self.end_time);
        Ok(())
    }

    /// Finds the beacon of `creator` whose window contains `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the document is malformed.
    pub fn find_beacon(
        store: &dyn DocumentStore,
        creator: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Self>> {
        store
            .find_one(BEACON_COLLECTION, &containing(creator, at))?
            .map(Self::from_document)
            .transpose()
    }

    /// Converts a stored document (for example a search hit) into a beacon.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if the document is malformed.
    pub fn from_document(doc: Document) -> Result<Self> {
        Ok(from_document(doc)?)
    }

    /// Replaces this value with the stored document for its key.
    ///
    /// Returns `false` (and leaves `self` untouched) if nothing is stored
    /// under `(creator, end_time)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the document is malformed.
    pub fn reload(&mut self, store: &dyn DocumentStore) -> Result<bool> {
        match store.find_one(BEACON_COLLECTION, &self.key())? {
            Some(doc) => {
                *self = Self::from_document(doc)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deletes this creator's beacon whose window contains `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BeaconNotFound`] if no such beacon is stored.
    pub fn delete_beacon(&self, store: &dyn DocumentStore, at: DateTime<Utc>) -> Result<()> {
        let result = store.delete_one(BEACON_COLLECTION, &containing(&self.creator, at))?;
        if result.deleted_count == 0 {
            return Err(CoreError::BeaconNotFound(self.creator.clone()));
        }

        info!("Deleted beacon of {} active at {}", self.creator, at);
        Ok(())
    }

    /// Deletes the current or upcoming beacon of `creator`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BeaconNotFound`] if the creator has no beacon
    /// that has not ended.
    pub fn delete_next_beacon(store: &dyn DocumentStore, creator: &str) -> Result<()> {
        Self::delete_next_beacon_at(store, creator, Utc::now())
    }

    /// [`Beacon::delete_next_beacon`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BeaconNotFound`] if the creator has no beacon
    /// ending after `now`.
    pub fn delete_next_beacon_at(
        store: &dyn DocumentStore,
        creator: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result = store.delete_one(BEACON_COLLECTION, &active_for(creator, now))?;
        if result.deleted_count == 0 {
            return Err(CoreError::BeaconNotFound(creator.to_string()));
        }

        info!("Deleted next beacon of {}", creator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::NewBeacon;
    use crate::geo::GeoPoint;
    use crate::store::SqliteStore;
    use chrono::{Duration, TimeZone};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn beacon(creator: &str, start: DateTime<Utc>, hours: i64) -> Beacon {
        Beacon::create(
            creator,
            NewBeacon::new(
                "Jam",
                GeoPoint::new(40.0, -73.0).unwrap(),
                start,
                start + Duration::hours(hours),
            ),
        )
    }

    #[test]
    fn insert_then_find() {
        let store = SqliteStore::in_memory().unwrap();
        let b = beacon("alice", noon(), 2);
        b.insert_at(&store, noon()).unwrap();

        let found = Beacon::find_beacon(&store, "alice", noon() + Duration::hours(1))
            .unwrap()
            .unwrap();
        assert_eq!(found, b);
        assert!(Beacon::find_beacon(&store, "alice", noon() + Duration::hours(3))
            .unwrap()
            .is_none());
        assert!(Beacon::find_beacon(&store, "bob", noon()).unwrap().is_none());
    }

    #[test]
    fn second_active_beacon_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        beacon("alice", noon(), 2).insert_at(&store, noon()).unwrap();

        let later = beacon("alice", noon() + Duration::hours(5), 1);
        let result = later.insert_at(&store, noon() + Duration::hours(1));
        assert!(matches!(result, Err(CoreError::ActiveBeaconExists(c)) if c == "alice"));
    }

    #[test]
    fn new_beacon_allowed_after_previous_ends() {
        let store = SqliteStore::in_memory().unwrap();
        beacon("alice", noon(), 2).insert_at(&store, noon()).unwrap();

        let later = beacon("alice", noon() + Duration::hours(5), 1);
        later.insert_at(&store, noon() + Duration::hours(3)).unwrap();
    }

    #[test]
    fn insert_rejects_invalid_range() {
        let store = SqliteStore::in_memory().unwrap();
        for bad in [f64::INFINITY, f64::NAN, 0.0, -2.0] {
            let mut b = beacon("alice", noon(), 2);
            b.range = bad;
            let result = b.insert_at(&store, noon());
            assert!(matches!(result, Err(CoreError::InvalidRange(_))), "range {bad}");
        }
        assert!(Beacon::find_beacon(&store, "alice", noon()).unwrap().is_none());
    }

    #[test]
    fn other_creators_are_independent() {
        let store = SqliteStore::in_memory().unwrap();
        beacon("alice", noon(), 2).insert_at(&store, noon()).unwrap();
        beacon("bob", noon(), 2).insert_at(&store, noon()).unwrap();
    }

    #[test]
    fn delete_beacon_by_time() {
        let store = SqliteStore::in_memory().unwrap();
        let b = beacon("alice", noon(), 2);
        b.insert_at(&store, noon()).unwrap();

        let outside = b.delete_beacon(&store, noon() + Duration::hours(4));
        assert!(matches!(outside, Err(CoreError::BeaconNotFound(_))));

        b.delete_beacon(&store, noon() + Duration::hours(1)).unwrap();
        assert!(Beacon::find_beacon(&store, "alice", noon()).unwrap().is_none());

        let again = b.delete_beacon(&store, noon() + Duration::hours(1));
        assert!(matches!(again, Err(CoreError::BeaconNotFound(_))));
    }

    #[test]
    fn delete_next_beacon_targets_future() {
        let store = SqliteStore::in_memory().unwrap();
        let b = beacon("alice", noon() + Duration::hours(4), 2);
        b.insert_at(&store, noon()).unwrap();

        Beacon::delete_next_beacon_at(&store, "alice", noon()).unwrap();
        let result = Beacon::delete_next_beacon_at(&store, "alice", noon());
        assert!(matches!(result, Err(CoreError::BeaconNotFound(_))));
    }

    #[test]
    fn delete_next_beacon_ignores_ended() {
        let store = SqliteStore::in_memory().unwrap();
        beacon("alice", noon(), 1).insert_at(&store, noon()).unwrap();

        let result = Beacon::delete_next_beacon_at(&store, "alice", noon() + Duration::hours(2));
        assert!(matches!(result, Err(CoreError::BeaconNotFound(_))));
    }

    #[test]
    fn reload_reads_stored_state() {
        let store = SqliteStore::in_memory().unwrap();
        let b = beacon("alice", noon(), 2);
        b.insert_at(&store, noon()).unwrap();

        let mut stale = b.clone();
        stale.title = "stale".to_string();
        assert!(stale.reload(&store).unwrap());
        assert_eq!(stale, b);

        let mut missing = beacon("bob", noon(), 2);
        assert!(!missing.reload(&store).unwrap());
    }
}
