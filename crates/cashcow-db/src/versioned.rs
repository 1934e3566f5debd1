//! # Versioned Store
//!
//! Optimistic concurrency for every mutable table, written once.
//!
//! ## Compare-and-Swap Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  caller holds entity read at version v                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE <table> SET <cols...>, version = version + 1, updated_at = ?    │
//! │   WHERE id = ? AND version = v                                          │
//! │   RETURNING updated_at, version                                         │
//! │       │                                                                 │
//! │       ├── one row  ──► entity.version = v + 1, updated_at refreshed     │
//! │       └── no row   ──► DbError::EditConflict (stale or vanished)        │
//! │                                                                         │
//! │  Soft delete: same statement, plus `AND is_deleted = 0`                 │
//! │       └── no row ──► recheck: deleted? AlreadyDeleted : gone? NotFound  │
//! │                                      : otherwise EditConflict           │
//! │                                                                         │
//! │  Hard delete: DELETE ... WHERE id = ?  (0 rows ──► NotFound)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No row locks are taken. Two writers holding the same version race; one
//! wins and the other gets `EditConflict`.

use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::query_builder::Separated;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::timeout::bounded;

// =============================================================================
// Traits
// =============================================================================

/// A row guarded by a version counter.
pub trait Versioned: Send + Sync {
    /// Table name.
    const TABLE: &'static str;

    /// Name used in errors ("User", "Breed", ...).
    const ENTITY: &'static str;

    fn id(&self) -> i64;

    fn version(&self) -> i64;

    /// Copies the store-assigned stamp back after a successful write.
    fn apply_stamp(&mut self, stamp: VersionStamp);

    /// Appends `column = ?` for every mutable column.
    ///
    /// `id`, `version`, `created_at` and `updated_at` are managed by the
    /// store and must not be pushed.
    fn push_assignments(&self, set: &mut Separated<'_, 'static, Sqlite, &'static str>);
}

/// A versioned row with a soft-delete flag.
pub trait SoftDelete: Versioned {
    const DELETED_COLUMN: &'static str = "is_deleted";

    fn mark_deleted(&mut self);
}

/// The `(updated_at, version)` pair a write hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct VersionStamp {
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

// =============================================================================
// Store
// =============================================================================

/// Generic compare-and-swap writer for one entity type.
#[derive(Debug, Clone)]
pub struct VersionedStore<E> {
    pool: SqlitePool,
    timeout: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Versioned> VersionedStore<E> {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        VersionedStore {
            pool,
            timeout,
            _entity: PhantomData,
        }
    }

    /// Loads one row by id.
    pub async fn get(&self, id: i64) -> DbResult<E>
    where
        E: for<'r> FromRow<'r, SqliteRow> + Unpin,
    {
        let sql = format!("SELECT * FROM {} WHERE id = ?", E::TABLE);
        bounded(self.timeout, "versioned.get", async {
            sqlx::query_as::<_, E>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(DbError::not_found(E::ENTITY))
        })
        .await
    }

    /// Writes every mutable column of `entity`, conditioned on its version.
    ///
    /// ## Returns
    /// * `Ok(())` - `entity.version` advanced by exactly one
    /// * `Err(DbError::EditConflict)` - stored version differs, or row is gone
    pub async fn update(&self, entity: &mut E) -> DbResult<()> {
        debug!(entity = E::ENTITY, id = entity.id(), version = entity.version(), "Versioned update");

        let stamp = self
            .compare_and_swap(entity.id(), entity.version(), "versioned.update", |set| {
                entity.push_assignments(set)
            })
            .await?;
        entity.apply_stamp(stamp);
        Ok(())
    }

    /// Writes a chosen subset of columns, conditioned on the version.
    ///
    /// Used where only one column should move, e.g. a password change.
    pub async fn update_columns<F>(&self, entity: &mut E, assign: F) -> DbResult<()>
    where
        F: FnOnce(&mut Separated<'_, 'static, Sqlite, &'static str>),
    {
        debug!(entity = E::ENTITY, id = entity.id(), version = entity.version(), "Versioned column update");

        let stamp = self
            .compare_and_swap(entity.id(), entity.version(), "versioned.update_columns", assign)
            .await?;
        entity.apply_stamp(stamp);
        Ok(())
    }

    async fn compare_and_swap<F>(
        &self,
        id: i64,
        version: i64,
        operation: &'static str,
        assign: F,
    ) -> DbResult<VersionStamp>
    where
        F: FnOnce(&mut Separated<'_, 'static, Sqlite, &'static str>),
    {
        let mut qb = QueryBuilder::<'static, Sqlite>::new(format!("UPDATE {} SET ", E::TABLE));
        {
            let mut set = qb.separated(", ");
            assign(&mut set);
            set.push("version = version + 1");
            set.push("updated_at = ");
            set.push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND version = ")
            .push_bind(version)
            .push(" RETURNING updated_at, version");

        let stamp = bounded(self.timeout, operation, async {
            Ok(qb
                .build_query_as::<VersionStamp>()
                .fetch_optional(&self.pool)
                .await?)
        })
        .await?;

        stamp.ok_or(DbError::EditConflict {
            entity: E::ENTITY,
            id,
        })
    }

    /// Removes the row outright.
    pub async fn hard_delete(&self, id: i64) -> DbResult<()> {
        debug!(entity = E::ENTITY, id, "Hard delete");

        let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
        let affected = bounded(self.timeout, "versioned.hard_delete", async {
            Ok(sqlx::query(&sql)
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(DbError::not_found(E::ENTITY));
        }
        Ok(())
    }
}

impl<E: SoftDelete> VersionedStore<E> {
    /// Sets the deleted flag, conditioned on the version and on the row not
    /// already being deleted.
    ///
    /// ## Returns
    /// * `Err(DbError::AlreadyDeleted)` - row exists and is already deleted
    /// * `Err(DbError::NotFound)` - no row with this id
    /// * `Err(DbError::EditConflict)` - row is live but the version moved on
    pub async fn soft_delete(&self, entity: &mut E) -> DbResult<()> {
        debug!(entity = E::ENTITY, id = entity.id(), "Soft delete");

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "UPDATE {table} SET {col} = 1, version = version + 1, updated_at = ",
            table = E::TABLE,
            col = E::DELETED_COLUMN
        ));
        qb.push_bind(Utc::now())
            .push(" WHERE id = ")
            .push_bind(entity.id())
            .push(" AND version = ")
            .push_bind(entity.version())
            .push(format!(" AND {} = 0", E::DELETED_COLUMN))
            .push(" RETURNING updated_at, version");

        let stamp = bounded(self.timeout, "versioned.soft_delete", async {
            Ok(qb
                .build_query_as::<VersionStamp>()
                .fetch_optional(&self.pool)
                .await?)
        })
        .await?;

        if let Some(stamp) = stamp {
            entity.mark_deleted();
            entity.apply_stamp(stamp);
            return Ok(());
        }

        let state_sql = format!("SELECT {} FROM {} WHERE id = ?", E::DELETED_COLUMN, E::TABLE);
        let deleted: Option<bool> = bounded(self.timeout, "versioned.soft_delete", async {
            Ok(sqlx::query_scalar(&state_sql)
                .bind(entity.id())
                .fetch_optional(&self.pool)
                .await?)
        })
        .await?;

        Err(match deleted {
            Some(true) => DbError::AlreadyDeleted {
                entity: E::ENTITY,
                id: entity.id(),
            },
            None => DbError::not_found(E::ENTITY),
            Some(false) => DbError::EditConflict {
                entity: E::ENTITY,
                id: entity.id(),
            },
        })
    }
}
