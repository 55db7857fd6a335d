//! JSON output for search results.
//!
//! Search results are wrapped in a single-key envelope:
//!
//! ```json
//! { "beacons": [ { ... }, { ... } ] }
//! ```

use serde_json::{Map, Value};

use crate::error::Result;
use crate::store::Document;
use crate::user::User;

/// Wraps `docs` as `{"<name>": [doc, ...]}`.
///
/// # Errors
///
/// Returns an error if serialization fails.
///
/// # Example
///
/// ```
/// use beacon_core::format::envelope;
///
/// assert_eq!(envelope("users", &[]).unwrap(), r#"{"users":[]}"#);
/// ```
pub fn envelope(name: &str, docs: &[Document]) -> Result<String> {
    let items = docs.iter().cloned().map(Value::Object).collect();
    let mut root = Map::new();
    root.insert(name.to_string(), Value::Array(items));
    Ok(serde_json::to_string(&root)?)
}

/// Wraps beacon search hits under `"beacons"`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn beacons_json(docs: &[Document]) -> Result<String> {
    envelope("beacons", docs)
}

/// Wraps user search hits under `"users"`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn users_json(docs: &[Document]) -> Result<String> {
    envelope("users", docs)
}

/// Serializes a single user; `None` when there is no user.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn user_json(user: Option<&User>) -> Result<Option<String>> {
    user.map(User::to_json).transpose()
}
