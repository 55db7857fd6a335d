//! Beacon Core Library
//!
//! Domain model for location-based, time-bounded events. A user places a
//! [`Beacon`] at a location for a time window; nearby users are found by
//! radius search and recorded in the beacon's notified set.
//!
//! Every operation takes an explicit [`DocumentStore`] handle. The crate
//! ships [`SqliteStore`] as an embedded implementation and
//! [`Argon2Credentials`] for password hashing.
//!
//! # Example
//!
//! ```
//! use beacon_core::{Argon2Credentials, GeoPoint, SqliteStore, User};
//!
//! let store = SqliteStore::in_memory().unwrap();
//! User::ensure_indexes(&store).unwrap();
//!
//! let home = GeoPoint::new(-73.6, 40.7).unwrap();
//! let alice = User::create(&Argon2Credentials, "alice", "secret", vec!["music".into()], home);
//! alice.insert(&store).unwrap();
//!
//! assert!(alice.authenticate(&store, &Argon2Credentials, "secret"));
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod beacon;
pub mod config;
pub mod credential;
pub mod error;
pub mod format;
pub mod geo;
pub mod store;
pub mod user;

pub use beacon::{Beacon, NewBeacon};
pub use config::StoreConfig;
pub use credential::{Argon2Credentials, CredentialService};
pub use error::{CoreError, Mutation, Result};
pub use geo::GeoPoint;
pub use store::{DocumentStore, SqliteStore};
pub use user::User;
