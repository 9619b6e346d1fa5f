//! SQLite persistent state: connection pool and tuning.
//!
//! SQLite is the single durable store for the runtime. The pool is
//! configured for concurrent readers with a single writer per connection:
//! write-ahead logging, `NORMAL` synchronous durability, an in-memory
//! temporary area, and a 64 MB page cache. Each logical worker leases a
//! connection from the pool and re-uses it for the lifetime of a request
//! (sqlx's acquire semantics).
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time
//! checked) so no live database is required at build time. All queries
//! are parameterized.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default acquire timeout in seconds.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Page cache size in KiB for `PRAGMA cache_size`
/// (negative value = KiB rather than pages).
const PAGE_CACHE_KIB: i64 = 65_536; // 64 MB

/// Configuration for the SQLite connection pool.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database path, or `:memory:` for an in-process database.
    pub path: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Timeout when waiting for a pool slot.
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    /// Create a configuration for an on-disk database file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().into_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Create a configuration for a private in-memory database.
    ///
    /// The pool is limited to one connection so every lease sees the same
    /// database. Intended for tests.
    pub fn in_memory() -> Self {
        Self {
            path: ":memory:".to_owned(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Connection pool handle to the SQLite store.
///
/// Wraps a [`sqlx::SqlitePool`]; the typed stores in this crate borrow it.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database and build the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the path cannot be parsed and
    /// [`DbError::Sqlite`] if the connection fails.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DbError> {
        let options = if config.path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::Config(format!("invalid sqlite url: {e}")))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
        }
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("temp_store", "MEMORY")
        .pragma("cache_size", format!("-{PAGE_CACHE_KIB}"))
        .foreign_keys(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        tracing::info!(
            path = %config.path,
            max_connections = config.max_connections,
            "connected to sqlite store"
        );

        Ok(Self { pool })
    }

    /// Run all pending migrations from the `migrations/` directory.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations completed");
        Ok(())
    }

    /// Open an in-memory store with migrations applied. Test helper.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the open or the migrations fail.
    pub async fn open_in_memory() -> Result<Self, DbError> {
        let store = Self::connect(&StoreConfig::in_memory()).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    /// Refresh table statistics for the query planner.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the statement fails.
    pub async fn analyze(&self) -> Result<(), DbError> {
        sqlx::query("ANALYZE").execute(&self.pool).await?;
        tracing::debug!("table statistics refreshed");
        Ok(())
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("sqlite pool closed");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn in_memory_store_opens_and_migrates() {
        let store = Store::open_in_memory().await.unwrap();
        // The migration created the topics table.
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM topics")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
        store.close().await;
    }

    #[tokio::test]
    async fn analyze_succeeds_on_fresh_store() {
        let store = Store::open_in_memory().await.unwrap();
        store.analyze().await.unwrap();
    }

    #[test]
    fn builder_methods_apply() {
        let config = StoreConfig::new("haven.db")
            .with_max_connections(4)
            .with_acquire_timeout(Duration::from_secs(1));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(1));
    }
}
