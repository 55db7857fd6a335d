//! Store configuration.
//!
//! Settings can be built in code or read from the environment. A `.env`
//! file in the working directory is honored.
//!
//! | Variable                  | Meaning                          | Default   |
//! |---------------------------|----------------------------------|-----------|
//! | `BEACON_DATABASE_PATH`    | `SQLite` file for the store      | in-memory |
//! | `BEACON_BUSY_TIMEOUT_MS`  | Wait for a locked database (ms)  | 5000      |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Environment variable naming the database file.
pub const DATABASE_PATH_VAR: &str = "BEACON_DATABASE_PATH";

/// Environment variable holding the busy timeout in milliseconds.
pub const BUSY_TIMEOUT_VAR: &str = "BEACON_BUSY_TIMEOUT_MS";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for opening a [`SqliteStore`](crate::store::SqliteStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file. `None` keeps the store in memory.
    pub database_path: Option<PathBuf>,
    /// How long a writer waits for a locked database.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Reads settings from the environment, loading `.env` first.
    ///
    /// Unset variables fall back to defaults. An unparsable timeout is
    /// logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(path) = env::var(DATABASE_PATH_VAR) {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(raw) = env::var(BUSY_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.busy_timeout = Duration::from_millis(ms),
                Err(e) => warn!("Ignoring {BUSY_TIMEOUT_VAR}={raw}: {e}"),
            }
        }

        config
    }

    /// Sets the database file.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}
