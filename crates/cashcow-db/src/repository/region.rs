//! Region catalogue, stored through the versioned store.

use chrono::Utc;
use sqlx::query_builder::Separated;
use sqlx::Sqlite;
use tracing::debug;

use cashcow_core::catalog::REGION_SORT_SAFELIST;
use cashcow_core::{MetaData, NewRegion, Region, RegionFilter};

use crate::error::DbResult;
use crate::listing::ListQuery;
use crate::repository::RepoContext;
use crate::timeout::bounded;
use crate::versioned::{VersionStamp, Versioned, VersionedStore};

const REGION_COLUMNS: &str = "id, name, code, version, created_at, updated_at";

impl Versioned for Region {
    const TABLE: &'static str = "regions";
    const ENTITY: &'static str = "Region";

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
        set.push("code = ");
        set.push_bind_unseparated(self.code.trim().to_string());
    }
}

#[derive(Debug, Clone)]
pub struct RegionRepository {
    ctx: RepoContext,
    store: VersionedStore<Region>,
}

impl RegionRepository {
    pub fn new(ctx: RepoContext) -> Self {
        let store = VersionedStore::new(ctx.pool.clone(), ctx.query_timeout);
        RegionRepository { ctx, store }
    }

    /// Inserts a region at version 1. Name and code are each unique.
    pub async fn insert(&self, input: &NewRegion) -> DbResult<Region> {
        input.validate()?;
        debug!(name = %input.name, code = %input.code, "Inserting region");

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO regions (name, code, created_at, updated_at) \
             VALUES (?, ?, ?, ?) RETURNING {REGION_COLUMNS}"
        );

        bounded(self.ctx.query_timeout, "regions.insert", async {
            Ok(sqlx::query_as::<_, Region>(&sql)
                .bind(input.name.trim())
                .bind(input.code.trim())
                .bind(now)
                .bind(now)
                .fetch_one(&self.ctx.pool)
                .await?)
        })
        .await
    }

    pub async fn get(&self, id: i64) -> DbResult<Region> {
        self.store.get(id).await
    }

    pub async fn update(&self, region: &mut Region) -> DbResult<()> {
        region.validate()?;
        self.store.update(region).await
    }

    pub async fn delete(&self, id: i64) -> DbResult<()> {
        self.store.hard_delete(id).await
    }

    pub async fn list(&self, filter: &RegionFilter) -> DbResult<(Vec<Region>, MetaData)> {
        let page = filter
            .filters
            .validate(REGION_SORT_SAFELIST, self.ctx.max_page_size)?;

        let mut query = ListQuery::new("regions", REGION_COLUMNS);
        query
            .contains("name", filter.name.as_deref())
            .contains("code", filter.code.as_deref());

        query
            .fetch_page(&self.ctx.pool, self.ctx.query_timeout, "regions.list", &page)
            .await
    }
}
