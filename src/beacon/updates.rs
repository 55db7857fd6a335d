//! Field updates and notification bookkeeping.
//!
//! Every update is one atomic write addressed by `(creator, end_time)`.
//! The in-memory beacon changes only when the store reports that the
//! document was modified.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{check_range, truncate_millis};
use super::{Beacon, BEACON_COLLECTION};
use crate::error::{CoreError, Mutation, Result};
use crate::geo::GeoPoint;
use crate::store::{DocumentStore, Filter, StoreError, Update};

impl Beacon {
    fn apply(&self, store: &dyn DocumentStore, filter: &Filter, update: &[Update]) -> Result<Mutation> {
        match store.update_one(BEACON_COLLECTION, filter, update) {
            Ok(result) => {
                debug!(
                    "Updated beacon of {}: matched {}, modified {}",
                    self.creator, result.matched_count, result.modified_count
                );
                Ok(Mutation::from_modified(result.modified_count))
            }
            Err(StoreError::DuplicateKey(key)) => {
                warn!("Beacon update for {} hit unique key {}; ignored", self.creator, key);
                Ok(Mutation::NoOp)
            }
            Err(e) => Err(CoreError::Store(e)),
        }
    }

    /// Sets one top-level field of the stored beacon.
    fn update_field(&self, store: &dyn DocumentStore, field: &str, value: Value) -> Result<Mutation> {
        self.apply(store, &self.key(), &[Update::Set(field.to_string(), value)])
    }

    /// Sets the title.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_title(&mut self, store: &dyn DocumentStore, title: &str) -> Result<Mutation> {
        let outcome = self.update_field(store, "title", Value::from(title))?;
        if outcome.is_updated() {
            self.title = title.to_string();
        }
        Ok(outcome)
    }

    /// Moves the beacon.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_location(&mut self, store: &dyn DocumentStore, location: GeoPoint) -> Result<Mutation> {
        let outcome = self.update_field(store, "location", serde_json::to_value(location)?)?;
        if outcome.is_updated() {
            self.location = location;
        }
        Ok(outcome)
    }

    /// Sets the start of the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_start_time(&mut self, store: &dyn DocumentStore, start: DateTime<Utc>) -> Result<Mutation> {
        let start = truncate_millis(start);
        let outcome = self.update_field(store, "startTime", Value::from(start.timestamp_millis()))?;
        if outcome.is_updated() {
            self.start_time = start;
        }
        Ok(outcome)
    }

    /// Sets the end of the window.
    ///
    /// The end time is part of the beacon's key, so on success this value
    /// is re-keyed to the new end time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_end_time(&mut self, store: &dyn DocumentStore, end: DateTime<Utc>) -> Result<Mutation> {
        let end = truncate_millis(end);
        let outcome = self.update_field(store, "endTime", Value::from(end.timestamp_millis()))?;
        if outcome.is_updated() {
            self.end_time = end;
        }
        Ok(outcome)
    }

    /// Sets the notification radius in miles.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRange`] if `range` is not finite and
    /// positive, or an error if the store fails.
    pub fn update_range(&mut self, store: &dyn DocumentStore, range: f64) -> Result<Mutation> {
        check_range(range)?;
        let outcome = self.update_field(store, "range", Value::from(range))?;
        if outcome.is_updated() {
            self.range = range;
        }
        Ok(outcome)
    }

    /// Sets the place name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_place_name(&mut self, store: &dyn DocumentStore, place_name: &str) -> Result<Mutation> {
        let outcome = self.update_field(store, "placeName", Value::from(place_name))?;
        if outcome.is_updated() {
            self.place_name = place_name.to_string();
        }
        Ok(outcome)
    }

    /// Sets the street address.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_address(&mut self, store: &dyn DocumentStore, address: &str) -> Result<Mutation> {
        let outcome = self.update_field(store, "address", Value::from(address))?;
        if outcome.is_updated() {
            self.address = address.to_string();
        }
        Ok(outcome)
    }

    /// Overwrites the notified count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_notified_count(&mut self, store: &dyn DocumentStore, count: u64) -> Result<Mutation> {
        let outcome = self.update_field(store, "notifiedCount", Value::from(count))?;
        if outcome.is_updated() {
            self.notified_count = count;
        }
        Ok(outcome)
    }

    /// Toggles each tag: absent tags are added, present tags removed.
    ///
    /// Presence is judged against this value. Additions and removals go in
    /// one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_tags(&mut self, store: &dyn DocumentStore, tags: &[String]) -> Result<Mutation> {
        let (remove, add): (Vec<&String>, Vec<&String>) =
            tags.iter().partition(|tag| self.tags.contains(tag));

        let mut update = Vec::with_capacity(2);
        if !add.is_empty() {
            let values = add.iter().map(|t| Value::from(t.as_str())).collect();
            update.push(Update::AddEachToSet("tags".into(), values));
        }
        if !remove.is_empty() {
            let values = remove.iter().map(|t| Value::from(t.as_str())).collect();
            update.push(Update::PullAll("tags".into(), values));
        }
        if update.is_empty() {
            return Ok(Mutation::NoOp);
        }

        let outcome = self.apply(store, &self.key(), &update)?;
        if outcome.is_updated() {
            for tag in add {
                if !self.tags.contains(tag) {
                    self.tags.push(tag.clone());
                }
            }
            self.tags.retain(|t| !remove.contains(&t));
        }
        Ok(outcome)
    }

    /// Adds one user to the notified set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn add_one_notified(&mut self, store: &dyn DocumentStore, username: &str) -> Result<Mutation> {
        self.add_many_notified(store, &[username.to_string()])
    }

    /// Adds users to the notified set. Members already present are skipped.
    ///
    /// The count is not touched; see [`crate::User::attend_beacon`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn add_many_notified(&mut self, store: &dyn DocumentStore, usernames: &[String]) -> Result<Mutation> {
        let values = usernames.iter().map(|u| Value::from(u.as_str())).collect();
        let outcome = self.apply(store, &self.key(), &[Update::AddEachToSet("notified".into(), values)])?;
        if outcome.is_updated() {
            for username in usernames {
                if !self.notified.contains(username) {
                    self.notified.push(username.clone());
                }
            }
        }
        Ok(outcome)
    }

    /// Counts `username` as notified, once.
    pub(crate) fn record_attendance(&mut self, store: &dyn DocumentStore, username: &str) -> Result<Mutation> {
        let filter = Filter::And(vec![self.key(), Filter::not_in("notified", [username])]);
        let update = [
            Update::Inc("notifiedCount".into(), 1),
            Update::AddToSet("notified".into(), Value::from(username)),
        ];

        let outcome = self.apply(store, &filter, &update)?;
        if outcome.is_updated() {
            self.notified_count += 1;
            if !self.notified.iter().any(|n| n == username) {
                self.notified.push(username.to_string());
            }
        }
        Ok(outcome)
    }
}
