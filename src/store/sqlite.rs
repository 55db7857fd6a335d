//! `SQLite`-backed document store.
//!
//! Documents live as JSON text in a single `documents` table, tagged with
//! their collection name. Predicates are evaluated in Rust by
//! [`Filter::matches`], so the store supports the full query language
//! without translating it to SQL.
//!
//! Each read or write loads and parses the whole collection, so this store
//! is meant for small data sets, embedded use, and tests.
//!
//! # Atomicity
//!
//! Every write runs inside an `IMMEDIATE` transaction, which takes the
//! database write lock before the first read. A conditional insert or a
//! read-modify-write update therefore cannot interleave with another
//! writer, whether that writer shares this handle or opens the same file
//! from another process.

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, TransactionBehavior};
use serde_json::Value;
use tracing::{debug, info};

use super::error::{Result, StoreError};
use super::query::{run_pipeline, values_equal, DeleteResult, Document, Filter, Stage, Update, UpdateResult};
use super::DocumentStore;
use crate::config::StoreConfig;

/// `SQLite`-based document store.
///
/// Thread-safe wrapper around a `SQLite` connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening document store at {}", path.display());
        Self::with_connection(Connection::open(path)?, StoreConfig::default().busy_timeout)
    }

    /// Creates an in-memory store.
    ///
    /// Useful for tests and for short-lived processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(
            Connection::open_in_memory()?,
            StoreConfig::default().busy_timeout,
        )
    }

    /// Opens a store as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let conn = match &config.database_path {
            Some(path) => {
                info!("Opening document store at {}", path.display());
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        Self::with_connection(conn, config.busy_timeout)
    }

    fn with_connection(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS documents_by_collection ON documents(collection);
            ",
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire database lock: {e}")))
    }
}

/// Loads every document of a collection in insertion order.
fn load(conn: &Connection, collection: &str) -> Result<Vec<(i64, Document)>> {
    let mut stmt =
        conn.prepare_cached("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")?;

    let rows = stmt
        .query_map(params![collection], |row| {
            let id: i64 = row.get(0)?;
            let body: String = row.get(1)?;
            Ok((id, body))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, body)| match serde_json::from_str::<Value>(&body)? {
            Value::Object(doc) => Ok((id, doc)),
            _ => Err(StoreError::InvalidDocument(format!(
                "{collection} row {id} is not a JSON object"
            ))),
        })
        .collect()
}

fn first_match(conn: &Connection, collection: &str, filter: &Filter) -> Result<Option<(i64, Document)>> {
    Ok(load(conn, collection)?
        .into_iter()
        .find(|(_, doc)| filter.matches(doc)))
}

fn insert(conn: &Connection, collection: &str, doc: &Document) -> Result<()> {
    let body = serde_json::to_string(doc)?;
    conn.execute(
        "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
        params![collection, body],
    )
    .map_err(|e| StoreError::from_write(e, collection))?;
    Ok(())
}

/// Accepts `[A-Za-z0-9_]+`, the only names interpolated into DDL.
fn validate_name(name: &str) -> Result<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

impl DocumentStore for SqliteStore {
    fn ensure_unique(&self, collection: &str, field: &str) -> Result<()> {
        validate_name(collection)?;
        validate_name(field)?;

        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {collection}_{field}_unique \
             ON documents(json_extract(body, '$.{field}')) \
             WHERE collection = '{collection}';"
        ))?;

        debug!(collection, field, "Unique index ensured");
        Ok(())
    }

    fn find(&self, collection: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let docs: Vec<Document> = load(&conn, collection)?
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| filter.matches(doc))
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        debug!(collection, found = docs.len(), "find");
        Ok(docs)
    }

    fn insert_one(&self, collection: &str, doc: Document) -> Result<()> {
        let conn = self.lock()?;
        insert(&conn, collection, &doc)?;
        info!(collection, "Inserted document");
        Ok(())
    }

    fn insert_unless(&self, collection: &str, guard: &Filter, doc: Document) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if first_match(&tx, collection, guard)?.is_some() {
            debug!(collection, "Conditional insert blocked by existing document");
            return Ok(false);
        }

        insert(&tx, collection, &doc)?;
        tx.commit()?;

        info!(collection, "Inserted document");
        Ok(true)
    }

    fn update_one(&self, collection: &str, filter: &Filter, update: &[Update]) -> Result<UpdateResult> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some((id, before)) = first_match(&tx, collection, filter)? else {
            debug!(collection, matched = 0, "update_one");
            return Ok(UpdateResult::default());
        };

        let mut after = before.clone();
        for op in update {
            op.apply(&mut after);
        }

        if values_equal(&Value::Object(before), &Value::Object(after.clone())) {
            debug!(collection, matched = 1, modified = 0, "update_one");
            return Ok(UpdateResult {
                matched_count: 1,
                modified_count: 0,
            });
        }

        let body = serde_json::to_string(&after)?;
        tx.execute(
            "UPDATE documents SET body = ?1 WHERE id = ?2",
            params![body, id],
        )
        .map_err(|e| StoreError::from_write(e, collection))?;
        tx.commit()?;

        debug!(collection, matched = 1, modified = 1, "update_one");
        Ok(UpdateResult {
            matched_count: 1,
            modified_count: 1,
        })
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some((id, _)) = first_match(&tx, collection, filter)? else {
            return Ok(DeleteResult::default());
        };

        tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        tx.commit()?;

        info!(collection, "Deleted document");
        Ok(DeleteResult { deleted_count: 1 })
    }

    fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let docs = load(&conn, collection)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect();

        let results = run_pipeline(docs, pipeline);
        debug!(collection, stages = pipeline.len(), found = results.len(), "aggregate");
        Ok(results)
    }
}
