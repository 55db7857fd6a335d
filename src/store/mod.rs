//! Document store gateway.
//!
//! Users and beacons are persisted as JSON documents in named
//! collections. The core talks to storage only through the
//! [`DocumentStore`] trait, so any backend offering the same query and
//! update semantics can be substituted.
//!
//! # Architecture
//!
//! ```text
//! User / Beacon operations
//!     └── &dyn DocumentStore
//!             ├── query (Filter, Update, Stage)
//!             └── SqliteStore (embedded implementation)
//! ```

mod error;
pub mod query;
mod sqlite;

pub use error::{Result, StoreError};
pub use query::{
    from_document, to_document, DeleteResult, Document, Filter, Stage, Update, UpdateResult,
};
pub use sqlite::SqliteStore;

/// Handle to a set of named document collections.
///
/// # Contract
///
/// - `insert_unless` and `update_one` are atomic: no other write can land
///   between the read of the matching document and the write.
/// - `update_one` reports `modified_count == 1` only if the document
///   content actually changed.
/// - A write that would violate a unique index fails with
///   [`StoreError::DuplicateKey`] and leaves the collection unchanged.
/// - Results come back in insertion order.
pub trait DocumentStore: Send + Sync {
    /// Declares a unique index on a top-level field of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be created, including when
    /// existing documents already violate it.
    fn ensure_unique(&self, collection: &str, field: &str) -> Result<()>;

    /// Returns documents matching `filter`, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn find(&self, collection: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>>;

    /// Returns the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(collection, filter, Some(1))?.into_iter().next())
    }

    /// Inserts a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] on a unique index violation.
    fn insert_one(&self, collection: &str, doc: Document) -> Result<()>;

    /// Inserts `doc` only if no document matches `guard`.
    ///
    /// Returns `true` if the document was inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] on a unique index violation.
    fn insert_unless(&self, collection: &str, guard: &Filter, doc: Document) -> Result<bool>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] on a unique index violation.
    fn update_one(&self, collection: &str, filter: &Filter, update: &[Update]) -> Result<UpdateResult>;

    /// Deletes the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult>;

    /// Runs an aggregation pipeline over a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>>;
}
