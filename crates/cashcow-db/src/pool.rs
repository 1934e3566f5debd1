//! # Store Handle
//!
//! Opens the SQLite file, applies the schema and hands out repositories that
//! share one pool and one per-operation deadline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppConfig::to_db_config()                                             │
//! │       │  path, pool bounds, query_timeout, max_page_size               │
//! │       ▼                                                                 │
//! │  Database::new ── open (WAL, foreign keys) ── migrate                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RepoContext { pool, query_timeout, max_page_size }                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  users()  tokens()  permissions()  breeds()  regions()                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent writers to one row never wait on each other; they race on the
//! version column and the loser sees an edit conflict.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::breed::BreedRepository;
use crate::repository::permission::PermissionRepository;
use crate::repository::region::RegionRepository;
use crate::repository::token::TokenRepository;
use crate::repository::user::UserRepository;
use crate::repository::RepoContext;
use crate::timeout::{bounded, DEFAULT_QUERY_TIMEOUT};
use cashcow_core::filters::DEFAULT_MAX_PAGE_SIZE;

// =============================================================================
// Configuration
// =============================================================================

/// Pool bounds and per-call limits for one [`Database`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Wait for a free pooled connection.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// Deadline for every repository call.
    pub query_timeout: Duration,
    /// Ceiling on a list request's `page_size`.
    pub max_page_size: i64,
    pub run_migrations: bool,
}

impl DbConfig {
    /// Defaults for a file-backed store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn max_page_size(mut self, max: i64) -> Self {
        self.max_page_size = max;
        self
    }

    /// A private in-memory store; one connection so every call sees the same data.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared store handle. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    query_timeout: Duration,
    max_page_size: i64,
}

impl Database {
    /// Opens (creating if absent) the store and migrates it unless
    /// `run_migrations` is off.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening store"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            query_timeout_ms = config.query_timeout.as_millis() as u64,
            "Store opened"
        );

        let db = Database {
            pool,
            query_timeout: config.query_timeout,
            max_page_size: config.max_page_size,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending schema migrations. Safe to repeat.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        debug!("Schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The per-operation deadline.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    fn context(&self) -> RepoContext {
        RepoContext {
            pool: self.pool.clone(),
            query_timeout: self.query_timeout,
            max_page_size: self.max_page_size,
        }
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.context())
    }

    pub fn tokens(&self) -> TokenRepository {
        TokenRepository::new(self.context())
    }

    pub fn permissions(&self) -> PermissionRepository {
        PermissionRepository::new(self.context())
    }

    pub fn breeds(&self) -> BreedRepository {
        BreedRepository::new(self.context())
    }

    pub fn regions(&self) -> RegionRepository {
        RegionRepository::new(self.context())
    }

    /// Round-trips a trivial statement under the query deadline.
    pub async fn ping(&self) -> DbResult<()> {
        bounded(self.query_timeout, "database.ping", async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }

    /// Waits for checked-out connections and closes the pool. Later calls fail.
    pub async fn close(&self) {
        info!("Closing store");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.ping().await.unwrap();
        assert_eq!(db.query_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/cashcow-test.db")
            .max_connections(4)
            .min_connections(2)
            .query_timeout(Duration::from_millis(500))
            .max_page_size(25);

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.query_timeout, Duration::from_millis(500));
        assert_eq!(config.max_page_size, 25);
        assert!(config.run_migrations);
    }

    #[tokio::test]
    async fn test_closed_store_refuses_calls() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(matches!(db.ping().await, Err(DbError::ConnectionFailed(_))));
        assert!(db.users().get_by_id(1).await.is_err());
    }
}
