//! Geographic primitives and proximity matching.
//!
//! - [`GeoPoint`]: validated, immutable coordinate, stored as GeoJSON
//! - [`proximity`]: pure construction of radius searches with
//!   inclusion, exclusion, tag, and limit stages
//!
//! # Example
//!
//! ```
//! use beacon_core::geo::{proximity, GeoPoint};
//!
//! let center = GeoPoint::new(-73.6, 40.7).unwrap();
//! let pipeline = proximity::nearby_beacons(10, center, 5.0);
//! assert_eq!(pipeline.len(), 2);
//! ```

mod point;
pub mod proximity;

pub use point::GeoPoint;
pub use proximity::{angular_radius, ProximityQuery, EARTH_RADIUS_MILES};
