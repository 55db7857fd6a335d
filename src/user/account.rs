//! Persistence, updates, and searches for users.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{User, USER_COLLECTION};
use crate::beacon::{Beacon, NewBeacon};
use crate::credential::CredentialService;
use crate::error::{CoreError, Mutation, Result};
use crate::geo::{proximity, GeoPoint};
use crate::store::{from_document, to_document, Document, DocumentStore, Filter, StoreError, Update};

fn by_name(username: &str) -> Filter {
    Filter::eq("username", username)
}

impl User {
    /// Persists a new user.
    ///
    /// The existence check and the write are a single conditional insert,
    /// so two concurrent inserts of the same name cannot both succeed. The
    /// unique username index is put in place first if it is missing.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidUsername`] if the username is empty
    /// - [`CoreError::EmptyCredential`] if hashing failed at construction
    /// - [`CoreError::DuplicateUsername`] if the name is taken
    pub fn insert(&self, store: &dyn DocumentStore) -> Result<()> {
        if self.username.is_empty() {
            return Err(CoreError::InvalidUsername(self.username.clone()));
        }
        if self.credential_digest.is_empty() {
            return Err(CoreError::EmptyCredential(self.username.clone()));
        }

        Self::ensure_indexes(store)?;
        let doc = to_document(self)?;
        match store.insert_unless(USER_COLLECTION, &by_name(&self.username), doc) {
            Ok(true) => {
                info!("Inserted user {}", self.username);
                Ok(())
            }
            Ok(false) | Err(StoreError::DuplicateKey(_)) => {
                Err(CoreError::DuplicateUsername(self.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Checks `password` against the stored digest for this username.
    ///
    /// Returns `false` if the user is not stored, the store cannot be
    /// read, or the digest cannot be verified.
    pub fn authenticate(
        &self,
        store: &dyn DocumentStore,
        credentials: &dyn CredentialService,
        password: &str,
    ) -> bool {
        let doc = match store.find_one(USER_COLLECTION, &by_name(&self.username)) {
            Ok(Some(doc)) => doc,
            Ok(None) => return false,
            Err(e) => {
                warn!("Failed to load user {} for authentication: {}", self.username, e);
                return false;
            }
        };

        let Some(digest) = doc.get("passwordHash").and_then(Value::as_str) else {
            return false;
        };

        credentials.verify(password, digest).unwrap_or_else(|e| {
            warn!("Failed to verify password for {}: {}", self.username, e);
            false
        })
    }

    /// Loads a user by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the document is malformed.
    pub fn load_by_name(store: &dyn DocumentStore, username: &str) -> Result<Option<Self>> {
        store
            .find_one(USER_COLLECTION, &by_name(username))?
            .map(from_document::<Self>)
            .transpose()
            .map_err(Into::into)
    }

    /// Replaces this value with the persisted document.
    ///
    /// Returns `false` (and leaves `self` untouched) if no document with
    /// this username exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the document is malformed.
    pub fn reload(&mut self, store: &dyn DocumentStore) -> Result<bool> {
        match Self::load_by_name(store, &self.username)? {
            Some(stored) => {
                *self = stored;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Serializes the full user document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn update_stored(&self, store: &dyn DocumentStore, update: &[Update]) -> Result<Mutation> {
        let result = store.update_one(USER_COLLECTION, &by_name(&self.username), update)?;
        debug!(
            "Updated user {}: matched {}, modified {}",
            self.username, result.matched_count, result.modified_count
        );
        Ok(Mutation::from_modified(result.modified_count))
    }

    /// Renames this user.
    ///
    /// Uniqueness is enforced by the username index, which is created
    /// here if missing. Beacons keep their `creator` value; the reference
    /// is advisory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidUsername`] if `new_name` is empty
    /// - [`CoreError::DuplicateUsername`] if another user holds `new_name`
    pub fn change_username(&mut self, store: &dyn DocumentStore, new_name: &str) -> Result<Mutation> {
        if new_name.is_empty() {
            return Err(CoreError::InvalidUsername(new_name.to_string()));
        }

        Self::ensure_indexes(store)?;
        let outcome = match self.update_stored(store, &[Update::set("username", new_name)]) {
            Err(CoreError::Store(StoreError::DuplicateKey(_))) => {
                return Err(CoreError::DuplicateUsername(new_name.to_string()));
            }
            other => other?,
        };

        if outcome.is_updated() {
            info!("Renamed user {} to {}", self.username, new_name);
            self.username = new_name.to_string();
        }
        Ok(outcome)
    }

    /// Adds one interest. A repeat add is a [`Mutation::NoOp`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn add_interest(&mut self, store: &dyn DocumentStore, interest: &str) -> Result<Mutation> {
        self.add_interests(store, &[interest.to_string()])
    }

    /// Adds several interests; members already present are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn add_interests(&mut self, store: &dyn DocumentStore, interests: &[String]) -> Result<Mutation> {
        let values = interests.iter().cloned().map(Value::String).collect();
        let outcome = self.update_stored(store, &[Update::AddEachToSet("interests".into(), values)])?;

        if outcome.is_updated() {
            for interest in interests {
                if !self.interests.contains(interest) {
                    self.interests.push(interest.clone());
                }
            }
        }
        Ok(outcome)
    }

    /// Removes one interest. Removing a non-member is a [`Mutation::NoOp`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove_interest(&mut self, store: &dyn DocumentStore, interest: &str) -> Result<Mutation> {
        self.remove_interests(store, &[interest.to_string()])
    }

    /// Removes several interests.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove_interests(&mut self, store: &dyn DocumentStore, interests: &[String]) -> Result<Mutation> {
        let values = interests.iter().cloned().map(Value::String).collect();
        let outcome = self.update_stored(store, &[Update::PullAll("interests".into(), values)])?;

        if outcome.is_updated() {
            self.interests.retain(|i| !interests.contains(i));
        }
        Ok(outcome)
    }

    /// Sets the last known location of `username`.
    ///
    /// This value follows the write only when `username` names this user.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_last_location(
        &mut self,
        store: &dyn DocumentStore,
        username: &str,
        location: GeoPoint,
    ) -> Result<Mutation> {
        let update = Update::Set("lastLocation".into(), serde_json::to_value(location)?);
        let result = store.update_one(USER_COLLECTION, &by_name(username), &[update])?;
        let outcome = Mutation::from_modified(result.modified_count);

        if outcome.is_updated() && username == self.username {
            self.last_location = location;
        }
        Ok(outcome)
    }

    /// Creates and stores a beacon owned by this user.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ActiveBeaconExists`] if this user already has a
    /// beacon that has not ended.
    pub fn place_beacon(&self, store: &dyn DocumentStore, new: NewBeacon) -> Result<Beacon> {
        let beacon = Beacon::create(self.username.clone(), new);
        beacon.insert(store)?;
        Ok(beacon)
    }

    /// Records this user as attending `beacon`.
    ///
    /// The count increment and the notified-set insertion are one atomic
    /// update that only applies while this user is not yet notified, so a
    /// repeat call is a [`Mutation::NoOp`] and the count stays exact.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn attend_beacon(&self, store: &dyn DocumentStore, beacon: &mut Beacon) -> Result<Mutation> {
        beacon.record_attendance(store, &self.username)
    }

    /// Users within `radius_miles` of `center`, minus the already notified.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn find_nearby_users(
        store: &dyn DocumentStore,
        center: GeoPoint,
        radius_miles: f64,
        exclude: &[String],
    ) -> Result<Vec<Document>> {
        let pipeline = proximity::nearby_users(center, radius_miles, exclude);
        Ok(store.aggregate(USER_COLLECTION, &pipeline)?)
    }

    /// Like [`User::find_nearby_users`], restricted to the `include` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn private_find_nearby_users(
        store: &dyn DocumentStore,
        center: GeoPoint,
        radius_miles: f64,
        exclude: &[String],
        include: &[String],
    ) -> Result<Vec<Document>> {
        let pipeline = proximity::private_nearby_users(center, radius_miles, exclude, include);
        Ok(store.aggregate(USER_COLLECTION, &pipeline)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    struct Plain;

    impl CredentialService for Plain {
        fn hash(&self, plaintext: &str) -> Result<String> {
            Ok(format!("plain:{plaintext}"))
        }

        fn verify(&self, plaintext: &str, digest: &str) -> Result<bool> {
            if !digest.starts_with("plain:") {
                return Err(CoreError::Credential("bad digest".to_string()));
            }
            Ok(digest == format!("plain:{plaintext}"))
        }
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        User::ensure_indexes(&store).unwrap();
        store
    }

    fn point(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).unwrap()
    }

    fn user(name: &str) -> User {
        User::create(&Plain, name, "pw", vec!["music".into()], point(0.0, 0.0))
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter()
            .filter_map(|d| d.get("username").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn insert_and_load() {
        let store = store();
        let alice = user("alice");
        alice.insert(&store).unwrap();

        let loaded = User::load_by_name(&store, "alice").unwrap().unwrap();
        assert_eq!(loaded, alice);
        assert!(User::load_by_name(&store, "nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = store();
        user("alice").insert(&store).unwrap();

        let result = user("alice").insert(&store);
        assert!(matches!(result, Err(CoreError::DuplicateUsername(name)) if name == "alice"));
        assert_eq!(store.find(USER_COLLECTION, &by_name("alice"), None).unwrap().len(), 1);
    }

    #[test]
    fn empty_username_rejected() {
        let store = store();
        let result = user("").insert(&store);
        assert!(matches!(result, Err(CoreError::InvalidUsername(_))));
    }

    #[test]
    fn empty_digest_rejected() {
        let store = store();
        let mut alice = user("alice");
        alice.credential_digest.clear();

        let result = alice.insert(&store);
        assert!(matches!(result, Err(CoreError::EmptyCredential(_))));
        assert!(User::load_by_name(&store, "alice").unwrap().is_none());
    }

    #[test]
    fn authenticate_checks_stored_digest() {
        let store = store();
        let alice = user("alice");
        assert!(!alice.authenticate(&store, &Plain, "pw"));

        alice.insert(&store).unwrap();
        assert!(alice.authenticate(&store, &Plain, "pw"));
        assert!(!alice.authenticate(&store, &Plain, "wrong"));
    }

    #[test]
    fn authenticate_swallows_verify_errors() {
        let store = store();
        let mut alice = user("alice");
        alice.credential_digest = "garbage".to_string();
        alice.insert(&store).unwrap();

        assert!(!alice.authenticate(&store, &Plain, "pw"));
    }

    #[test]
    fn add_interest_is_idempotent() {
        let store = store();
        let mut alice = user("alice");
        alice.insert(&store).unwrap();

        assert_eq!(alice.add_interest(&store, "art").unwrap(), Mutation::Updated);
        assert_eq!(alice.add_interest(&store, "art").unwrap(), Mutation::NoOp);
        assert_eq!(alice.interests(), ["music", "art"]);

        alice.reload(&store).unwrap();
        assert_eq!(alice.interests(), ["music", "art"]);
    }

    #[test]
    fn remove_interest_of_non_member_is_noop() {
        let store = store();
        let mut alice = user("alice");
        alice.insert(&store).unwrap();

        assert_eq!(alice.remove_interest(&store, "art").unwrap(), Mutation::NoOp);
        assert_eq!(alice.remove_interest(&store, "music").unwrap(), Mutation::Updated);
        assert!(alice.interests().is_empty());
    }

    #[test]
    fn bulk_interest_updates() {
        let store = store();
        let mut alice = user("alice");
        alice.insert(&store).unwrap();

        let added = vec!["art".to_string(), "music".to_string(), "film".to_string()];
        assert_eq!(alice.add_interests(&store, &added).unwrap(), Mutation::Updated);
        assert_eq!(alice.interests(), ["music", "art", "film"]);

        let removed = vec!["art".to_string(), "film".to_string()];
        assert_eq!(alice.remove_interests(&store, &removed).unwrap(), Mutation::Updated);
        assert_eq!(alice.interests(), ["music"]);
    }

    #[test]
    fn unstored_user_updates_are_noops() {
        let store = store();
        let mut ghost = user("ghost");

        assert_eq!(ghost.add_interest(&store, "art").unwrap(), Mutation::NoOp);
        assert_eq!(ghost.interests(), ["music"]);
    }

    #[test]
    fn change_username_respects_uniqueness() {
        let store = store();
        let mut alice = user("alice");
        alice.insert(&store).unwrap();
        user("bob").insert(&store).unwrap();

        let result = alice.change_username(&store, "bob");
        assert!(matches!(result, Err(CoreError::DuplicateUsername(name)) if name == "bob"));
        assert_eq!(alice.username(), "alice");

        assert_eq!(alice.change_username(&store, "alicia").unwrap(), Mutation::Updated);
        assert_eq!(alice.username(), "alicia");
        assert!(User::load_by_name(&store, "alice").unwrap().is_none());
        assert!(User::load_by_name(&store, "alicia").unwrap().is_some());
    }

    #[test]
    fn change_username_without_index_setup_stays_unique() {
        let store = SqliteStore::in_memory().unwrap();
        let mut alice = user("alice");
        alice.insert(&store).unwrap();
        user("bob").insert(&store).unwrap();

        let result = alice.change_username(&store, "bob");
        assert!(matches!(result, Err(CoreError::DuplicateUsername(name)) if name == "bob"));
        assert_eq!(alice.username(), "alice");
        assert_eq!(store.find(USER_COLLECTION, &by_name("bob"), None).unwrap().len(), 1);
        assert!(User::load_by_name(&store, "alice").unwrap().is_some());
    }

    #[test]
    fn change_username_rejects_empty() {
        let store = store();
        let mut alice = user("alice");
        alice.insert(&store).unwrap();

        assert!(matches!(
            alice.change_username(&store, ""),
            Err(CoreError::InvalidUsername(_))
        ));
    }

    #[test]
    fn update_last_location_mirrors_only_self() {
        let store = store();
        let mut alice = user("alice");
        alice.insert(&store).unwrap();
        user("bob").insert(&store).unwrap();

        let there = point(10.0, 20.0);
        assert_eq!(
            alice.update_last_location(&store, "bob", there).unwrap(),
            Mutation::Updated
        );
        assert_eq!(alice.last_location(), point(0.0, 0.0));
        let bob = User::load_by_name(&store, "bob").unwrap().unwrap();
        assert_eq!(bob.last_location(), there);

        alice.update_last_location(&store, "alice", there).unwrap();
        assert_eq!(alice.last_location(), there);
    }

    #[test]
    fn reload_missing_user_returns_false() {
        let store = store();
        let mut alice = user("alice");
        assert!(!alice.reload(&store).unwrap());
        assert_eq!(alice.username(), "alice");
    }

    #[test]
    fn to_json_contains_document_keys() {
        let json = user("alice").to_json().unwrap();
        assert!(json.contains("\"passwordHash\""));
        assert!(json.contains("\"lastLocation\""));
    }

    #[test]
    fn nearby_users_excludes_notified() {
        let store = store();
        for (name, lon) in [("alice", 0.0), ("bob", 0.01), ("carol", 0.02), ("far", 10.0)] {
            User::create(&Plain, name, "pw", vec![], point(lon, 0.0))
                .insert(&store)
                .unwrap();
        }

        let found =
            User::find_nearby_users(&store, point(0.0, 0.0), 5.0, &["alice".to_string()]).unwrap();
        assert_eq!(names(&found), ["bob", "carol"]);
    }

    #[test]
    fn private_nearby_users_restricts_to_selection() {
        let store = store();
        for (name, lon) in [("alice", 0.0), ("bob", 0.01), ("carol", 0.02), ("far", 10.0)] {
            User::create(&Plain, name, "pw", vec![], point(lon, 0.0))
                .insert(&store)
                .unwrap();
        }

        let found = User::private_find_nearby_users(
            &store,
            point(0.0, 0.0),
            5.0,
            &["alice".to_string()],
            &["alice".to_string(), "carol".to_string(), "far".to_string()],
        )
        .unwrap();
        assert_eq!(names(&found), ["carol"]);
    }
}
