//! Filter, update, and pipeline language for the document store.
//!
//! A small subset of a document-database query language, covering what
//! beacons and users need.
//!
//! # Array semantics
//!
//! Matching follows document-store conventions. When a field holds an
//! array, `Eq`, `In`, and the comparison filters match if ANY element
//! matches. `NotIn` matches only if NO element is in the list, and also
//! matches a missing field.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::geo::GeoPoint;

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// A predicate over documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value (or an array field contains it).
    Eq(String, Value),
    /// Field is greater than value.
    Gt(String, Value),
    /// Field is greater than or equal to value.
    Gte(String, Value),
    /// Field is less than value.
    Lt(String, Value),
    /// Field is less than or equal to value.
    Lte(String, Value),
    /// Field matches any of the values.
    In(String, Vec<Value>),
    /// Field matches none of the values.
    NotIn(String, Vec<Value>),
    /// All sub-filters match.
    And(Vec<Filter>),
    /// The sub-filter does not match.
    Not(Box<Filter>),
    /// Field holds a point within `radius` radians of `center`.
    WithinSphere {
        /// Field holding a GeoJSON point.
        field: String,
        /// Center of the spherical cap.
        center: GeoPoint,
        /// Angular radius in radians.
        radius: f64,
    },
}

impl Filter {
    /// Shorthand for [`Filter::Eq`].
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    /// Shorthand for [`Filter::Gt`].
    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::Gt(field.to_string(), value.into())
    }

    /// Shorthand for [`Filter::Gte`].
    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::Gte(field.to_string(), value.into())
    }

    /// Shorthand for [`Filter::Lte`].
    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::Lte(field.to_string(), value.into())
    }

    /// Shorthand for [`Filter::In`].
    pub fn is_in<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// Shorthand for [`Filter::NotIn`].
    pub fn not_in<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::NotIn(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// Evaluates this filter against a document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq(field, expected) => {
                field_values(doc, field).any(|v| values_equal(v, expected))
            }
            Self::Gt(field, bound) => compare_any(doc, field, bound, Ordering::is_gt),
            Self::Gte(field, bound) => compare_any(doc, field, bound, Ordering::is_ge),
            Self::Lt(field, bound) => compare_any(doc, field, bound, Ordering::is_lt),
            Self::Lte(field, bound) => compare_any(doc, field, bound, Ordering::is_le),
            Self::In(field, candidates) => field_values(doc, field)
                .any(|v| candidates.iter().any(|c| values_equal(v, c))),
            Self::NotIn(field, candidates) => !field_values(doc, field)
                .any(|v| candidates.iter().any(|c| values_equal(v, c))),
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Self::Not(inner) => !inner.matches(doc),
            Self::WithinSphere {
                field,
                center,
                radius,
            } => lookup(doc, field)
                .and_then(|v| serde_json::from_value::<GeoPoint>(v.clone()).ok())
                .is_some_and(|point| center.angular_distance(&point) <= *radius),
        }
    }
}

/// A single update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replace the field value.
    Set(String, Value),
    /// Add a number to the field (missing counts as zero).
    Inc(String, i64),
    /// Append the value to an array field unless already present.
    AddToSet(String, Value),
    /// `AddToSet` for each value.
    AddEachToSet(String, Vec<Value>),
    /// Remove every occurrence of the value from an array field.
    Pull(String, Value),
    /// `Pull` for each value.
    PullAll(String, Vec<Value>),
}

impl Update {
    /// Shorthand for [`Update::Set`].
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        Self::Set(field.to_string(), value.into())
    }

    /// Applies this operator to a document in place.
    ///
    /// Only top-level fields are addressed. Applying an array operator to
    /// a non-array field leaves the document untouched.
    pub fn apply(&self, doc: &mut Document) {
        match self {
            Self::Set(field, value) => {
                doc.insert(field.clone(), value.clone());
            }
            Self::Inc(field, delta) => {
                let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
                doc.insert(field.clone(), Value::from(current.saturating_add(*delta)));
            }
            Self::AddToSet(field, value) => add_each(doc, field, std::slice::from_ref(value)),
            Self::AddEachToSet(field, values) => add_each(doc, field, values),
            Self::Pull(field, value) => pull_each(doc, field, std::slice::from_ref(value)),
            Self::PullAll(field, values) => pull_each(doc, field, values),
        }
    }
}

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching the filter.
    Match(Filter),
    /// Keep at most this many documents.
    Limit(usize),
}

/// Runs a pipeline over documents in order.
#[must_use]
pub fn run_pipeline(mut docs: Vec<Document>, pipeline: &[Stage]) -> Vec<Document> {
    for stage in pipeline {
        match stage {
            Stage::Match(filter) => docs.retain(|d| filter.matches(d)),
            Stage::Limit(max) => docs.truncate(*max),
        }
    }
    docs
}

/// Outcome of an `update_one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    /// Documents matching the filter (0 or 1).
    pub matched_count: u64,
    /// Documents whose content changed (0 or 1).
    pub modified_count: u64,
}

/// Outcome of a `delete_one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteResult {
    /// Documents removed (0 or 1).
    pub deleted_count: u64,
}

/// Serializes a value that maps to a JSON object into a document.
///
/// # Errors
///
/// Returns an error if serialization fails or the value is not an object.
pub fn to_document<T: Serialize>(value: &T) -> serde_json::Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserializes a document into a typed value.
///
/// # Errors
///
/// Returns an error if the document does not have the expected shape.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> serde_json::Result<T> {
    serde_json::from_value(Value::Object(doc))
}

/// Resolves a dotted path to a value.
fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// The value at `path`, flattened one level if it is an array.
fn field_values<'a>(doc: &'a Document, path: &str) -> Box<dyn Iterator<Item = &'a Value> + 'a> {
    match lookup(doc, path) {
        None => Box::new(std::iter::empty()),
        Some(Value::Array(items)) => Box::new(items.iter()),
        Some(other) => Box::new(std::iter::once(other)),
    }
}

fn compare_any(doc: &Document, path: &str, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    field_values(doc, path).any(|v| compare(v, bound).is_some_and(accept))
}

/// Orders two scalars of the same kind. Mixed kinds are incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// JSON equality that treats `1` and `1.0` as the same number.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn add_each(doc: &mut Document, field: &str, values: &[Value]) {
    let entry = doc
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = entry {
        for value in values {
            if !items.iter().any(|item| values_equal(item, value)) {
                items.push(value.clone());
            }
        }
    }
}

fn pull_each(doc: &mut Document, field: &str, values: &[Value]) {
    if let Some(Value::Array(items)) = doc.get_mut(field) {
        items.retain(|item| !values.iter().any(|v| values_equal(item, v)));
    }
}
