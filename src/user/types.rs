//! The user value type.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::credential::CredentialService;
use crate::geo::GeoPoint;

/// A user account.
///
/// The stored document uses camelCase keys, with the credential digest
/// under `passwordHash`:
///
/// ```json
/// {
///   "username": "alice",
///   "passwordHash": "$argon2id$...",
///   "interests": ["music"],
///   "lastLocation": { "type": "Point", "coordinates": [40.0, -73.0] }
/// }
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub(super) username: String,
    #[serde(rename = "passwordHash")]
    pub(super) credential_digest: String,
    #[serde(default)]
    pub(super) interests: Vec<String>,
    pub(super) last_location: GeoPoint,
}

impl User {
    /// Builds a user in memory, hashing `password` with `credentials`.
    ///
    /// Nothing is persisted until [`User::insert`]. Duplicate interests
    /// are collapsed, keeping first occurrence order.
    ///
    /// If hashing fails the failure is logged and the digest is left
    /// empty; [`User::insert`] then refuses the user.
    #[must_use]
    pub fn create(
        credentials: &dyn CredentialService,
        username: impl Into<String>,
        password: &str,
        interests: Vec<String>,
        last_location: GeoPoint,
    ) -> Self {
        let username = username.into();
        let credential_digest = credentials.hash(password).unwrap_or_else(|e| {
            warn!("Failed to hash password for {}: {}", username, e);
            String::new()
        });

        let mut unique: Vec<String> = Vec::with_capacity(interests.len());
        for interest in interests {
            if !unique.contains(&interest) {
                unique.push(interest);
            }
        }

        Self {
            username,
            credential_digest,
            interests: unique,
            last_location,
        }
    }

    /// The unique account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The stored password digest. Empty if hashing failed.
    #[must_use]
    pub fn credential_digest(&self) -> &str {
        &self.credential_digest
    }

    /// Interest tags, without duplicates.
    #[must_use]
    pub fn interests(&self) -> &[String] {
        &self.interests
    }

    /// Where the user was last seen.
    #[must_use]
    pub const fn last_location(&self) -> GeoPoint {
        self.last_location
    }
}

// Keep the digest out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("credential_digest", &"<redacted>")
            .field("interests", &self.interests)
            .field("last_location", &self.last_location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, Result};

    struct Plain;

    impl CredentialService for Plain {
        fn hash(&self, plaintext: &str) -> Result<String> {
            Ok(format!("plain:{plaintext}"))
        }

        fn verify(&self, plaintext: &str, digest: &str) -> Result<bool> {
            Ok(digest == format!("plain:{plaintext}"))
        }
    }

    struct Broken;

    impl CredentialService for Broken {
        fn hash(&self, _plaintext: &str) -> Result<String> {
            Err(CoreError::Credential("no entropy".to_string()))
        }

        fn verify(&self, _plaintext: &str, _digest: &str) -> Result<bool> {
            Err(CoreError::Credential("no entropy".to_string()))
        }
    }

    fn here() -> GeoPoint {
        GeoPoint::new(40.0, -73.0).unwrap()
    }

    #[test]
    fn create_hashes_password() {
        let user = User::create(&Plain, "alice", "pw", vec![], here());
        assert_eq!(user.username(), "alice");
        assert_eq!(user.credential_digest(), "plain:pw");
        assert_eq!(user.last_location(), here());
    }

    #[test]
    fn create_collapses_duplicate_interests() {
        let interests = vec!["music".into(), "art".into(), "music".into()];
        let user = User::create(&Plain, "alice", "pw", interests, here());
        assert_eq!(user.interests(), ["music", "art"]);
    }

    #[test]
    fn hash_failure_leaves_empty_digest() {
        let user = User::create(&Broken, "alice", "pw", vec![], here());
        assert!(user.credential_digest().is_empty());
    }

    #[test]
    fn serializes_with_document_keys() {
        let user = User::create(&Plain, "alice", "pw", vec!["music".into()], here());
        let value = serde_json::to_value(&user).unwrap();

        assert_eq!(value["username"], "alice");
        assert_eq!(value["passwordHash"], "plain:pw");
        assert_eq!(value["interests"][0], "music");
        assert_eq!(value["lastLocation"]["type"], "Point");
        assert_eq!(value["lastLocation"]["coordinates"][0], 40.0);
    }

    #[test]
    fn missing_interests_default_to_empty() {
        let json = r#"{
            "username": "bob",
            "passwordHash": "x",
            "lastLocation": {"type": "Point", "coordinates": [1.0, 2.0]}
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.interests().is_empty());
    }

    #[test]
    fn debug_redacts_digest() {
        let user = User::create(&Plain, "alice", "pw", vec![], here());
        let debug = format!("{user:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("plain:pw"));
    }
}
