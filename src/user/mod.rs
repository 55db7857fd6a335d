//! User accounts.
//!
//! A user is identified by a unique username and carries a credential
//! digest, a set of interest tags, and a last known location. Users place
//! beacons and attend the beacons of others.
//!
//! # Architecture
//!
//! ```text
//! User
//!     ├── CredentialService (hash / verify)
//!     ├── DocumentStore ("users" collection)
//!     └── Beacon (place / attend)
//! ```
//!
//! # Mirror rule
//!
//! Each update is one atomic write to the stored document. The in-memory
//! `User` changes only after the store reports a modification, so it never
//! runs ahead of the persisted state. [`User::reload`] brings it back in
//! line when another writer has touched the document.

mod account;
mod types;

pub use types::User;

use crate::error::Result;
use crate::store::DocumentStore;

/// Collection holding user documents.
pub const USER_COLLECTION: &str = "users";

impl User {
    /// Declares the indexes the `users` collection relies on.
    ///
    /// Call once per store before inserting users. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be created.
    pub fn ensure_indexes(store: &dyn DocumentStore) -> Result<()> {
        store.ensure_unique(USER_COLLECTION, "username")?;
        Ok(())
    }
}
