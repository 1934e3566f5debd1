//! # Breed Repository
//!
//! Breed catalogue. Writes go through [`VersionedStore`]; there is no soft
//! delete, inactive breeds are kept with `is_active = 0`.

use chrono::Utc;
use sqlx::query_builder::Separated;
use sqlx::Sqlite;
use tracing::debug;

use cashcow_core::catalog::BREED_SORT_SAFELIST;
use cashcow_core::{Breed, BreedFilter, MetaData, NewBreed};

use crate::error::DbResult;
use crate::listing::ListQuery;
use crate::repository::RepoContext;
use crate::timeout::bounded;
use crate::versioned::{VersionStamp, Versioned, VersionedStore};

const BREED_COLUMNS: &str = "id, name, description, is_active, version, created_at, updated_at";

impl Versioned for Breed {
    const TABLE: &'static str = "breeds";
    const ENTITY: &'static str = "Breed";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply_stamp(&mut self, stamp: VersionStamp) {
        self.updated_at = stamp.updated_at;
        self.version = stamp.version;
    }

    fn push_assignments(&self, set: &mut Separated<'_, 'static, Sqlite, &'static str>) {
        set.push("name = ");
        set.push_bind_unseparated(self.name.trim().to_string());
        set.push("description = ");
        set.push_bind_unseparated(self.description.clone());
        set.push("is_active = ");
        set.push_bind_unseparated(self.is_active);
    }
}

/// Repository for breeds.
#[derive(Debug, Clone)]
pub struct BreedRepository {
    ctx: RepoContext,
    store: VersionedStore<Breed>,
}

impl BreedRepository {
    pub fn new(ctx: RepoContext) -> Self {
        let store = VersionedStore::new(ctx.pool.clone(), ctx.query_timeout);
        BreedRepository { ctx, store }
    }

    /// Inserts a breed at version 1.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - name already catalogued
    pub async fn insert(&self, input: &NewBreed) -> DbResult<Breed> {
        input.validate()?;
        debug!(name = %input.name, "Inserting breed");

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO breeds (name, description, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {BREED_COLUMNS}"
        );

        bounded(self.ctx.query_timeout, "breeds.insert", async {
            Ok(sqlx::query_as::<_, Breed>(&sql)
                .bind(input.name.trim())
                .bind(&input.description)
                .bind(input.is_active)
                .bind(now)
                .bind(now)
                .fetch_one(&self.ctx.pool)
                .await?)
        })
        .await
    }

    pub async fn get(&self, id: i64) -> DbResult<Breed> {
        self.store.get(id).await
    }

    /// Validates and writes the breed, conditioned on `breed.version`.
    pub async fn update(&self, breed: &mut Breed) -> DbResult<()> {
        breed.validate()?;
        self.store.update(breed).await
    }

    pub async fn delete(&self, id: i64) -> DbResult<()> {
        self.store.hard_delete(id).await
    }

    pub async fn list(&self, filter: &BreedFilter) -> DbResult<(Vec<Breed>, MetaData)> {
        let page = filter
            .filters
            .validate(BREED_SORT_SAFELIST, self.ctx.max_page_size)?;

        let mut query = ListQuery::new("breeds", BREED_COLUMNS);
        query
            .contains("name", filter.name.as_deref())
            .eq("is_active", filter.is_active);

        query
            .fetch_page(&self.ctx.pool, self.ctx.query_timeout, "breeds.list", &page)
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::test_db;
    use cashcow_core::Filters;

    #[tokio::test]
    async fn test_insert_get_update() {
        let db = test_db().await;
        let repo = db.breeds();

        let mut breed = repo
            .insert(&NewBreed::new("Mashona", "Indigenous, hardy"))
            .await
            .unwrap();
        assert_eq!(breed.version, 1);
        assert!(breed.is_active);

        breed.is_active = false;
        repo.update(&mut breed).await.unwrap();
        assert_eq!(breed.version, 2);

        let stored = repo.get(breed.id).await.unwrap();
        assert_eq!(stored, breed);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let db = test_db().await;
        let repo = db.breeds();
        let mut first = repo.insert(&NewBreed::new("Tuli", "")).await.unwrap();
        let mut second = first.clone();

        first.description = "Heat tolerant".to_string();
        repo.update(&mut first).await.unwrap();

        second.description = "Sanga type".to_string();
        assert!(matches!(
            repo.update(&mut second).await,
            Err(DbError::EditConflict { entity: "Breed", .. })
        ));
        assert_eq!(second.version, 1);
        assert_eq!(repo.get(first.id).await.unwrap().description, "Heat tolerant");
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let db = test_db().await;
        let repo = db.breeds();
        repo.insert(&NewBreed::new("Brahman", "")).await.unwrap();

        match repo.insert(&NewBreed::new("Brahman", "again")).await {
            Err(DbError::UniqueViolation { field }) => assert_eq!(field, "name"),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete() {
        let db = test_db().await;
        let repo = db.breeds();
        let breed = repo.insert(&NewBreed::new("Nguni", "")).await.unwrap();

        repo.delete(breed.id).await.unwrap();
        assert!(matches!(repo.get(breed.id).await, Err(DbError::NotFound { .. })));
        assert!(matches!(repo.delete(breed.id).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let db = test_db().await;
        let repo = db.breeds();
        for name in ["Mashona", "Tuli", "Nguni", "Brahman", "Boran"] {
            repo.insert(&NewBreed::new(name, "")).await.unwrap();
        }
        let mut boran = repo.get(5).await.unwrap();
        boran.is_active = false;
        repo.update(&mut boran).await.unwrap();

        let filter = BreedFilter {
            name: Some("n".to_string()),
            is_active: Some(true),
            filters: Filters::new(1, 10, "-name"),
        };
        let (breeds, meta) = repo.list(&filter).await.unwrap();
        let names: Vec<&str> = breeds.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Nguni", "Mashona", "Brahman"]);
        assert_eq!(meta.total_records, 3);
    }
}
