//! Reusable test helpers for beacon integration tests.
//!
//! Stores are real `SqliteStore` instances, in memory unless a test needs
//! a file. Password hashing is swapped for a fast fake so tests do not pay
//! for Argon2 on every user.

#![allow(dead_code)]

use beacon_core::error::{CoreError, Result};
use beacon_core::{Beacon, CredentialService, GeoPoint, NewBeacon, SqliteStore, User};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Credential service that "hashes" by prefixing.
pub struct FakeCredentials;

impl CredentialService for FakeCredentials {
    fn hash(&self, plaintext: &str) -> Result<String> {
        Ok(format!("fake${plaintext}"))
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool> {
        let stored = digest
            .strip_prefix("fake$")
            .ok_or_else(|| CoreError::Credential(format!("not a fake digest: {digest}")))?;
        Ok(stored == plaintext)
    }
}

/// Creates an in-memory store with the user indexes in place.
pub fn new_store() -> SqliteStore {
    let store = SqliteStore::in_memory().expect("should open in-memory store");
    User::ensure_indexes(&store).expect("should create user indexes");
    store
}

/// Builds a validated point, panicking on bad test input.
pub fn point(longitude: f64, latitude: f64) -> GeoPoint {
    GeoPoint::new(longitude, latitude).expect("test coordinates should be valid")
}

/// Builds and stores a user.
pub fn insert_user(store: &SqliteStore, username: &str, interests: &[&str], location: GeoPoint) -> User {
    let interests = interests.iter().map(ToString::to_string).collect();
    let user = User::create(&FakeCredentials, username, "password", interests, location);
    user.insert(store).expect("should insert user");
    user
}

/// A fixed reference instant.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Beacon parameters for a window starting at `start` and lasting `hours`.
pub fn new_beacon(location: GeoPoint, start: DateTime<Utc>, hours: i64) -> NewBeacon {
    NewBeacon::new("Test beacon", location, start, start + Duration::hours(hours))
}

/// Builds and stores a beacon owned by `creator`, evaluated at `noon()`.
pub fn insert_beacon(store: &SqliteStore, creator: &str, new: NewBeacon) -> Beacon {
    let beacon = Beacon::create(creator, new);
    beacon.insert_at(store, noon()).expect("should insert beacon");
    beacon
}
