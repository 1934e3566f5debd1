//! # Permission Repository
//!
//! The permission catalogue and the user ↔ permission join.
//!
//! ## Grant
//! ```text
//! grant(user, ["cattle:read", "cattle:write"])
//!     │
//!     ├── BEGIN
//!     ├── SELECT id, code FROM permissions WHERE code IN (...)
//!     │       any code missing? ──► ROLLBACK, DbError::NotFound
//!     ├── INSERT INTO user_permissions ... ON CONFLICT DO NOTHING
//!     └── COMMIT
//! ```
//!
//! Re-granting a held code is a no-op, never a duplicate-key error.

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use cashcow_core::{NewPermission, Permission, Permissions};

use crate::error::{DbError, DbResult};
use crate::repository::RepoContext;
use crate::timeout::bounded;

/// Repository for permissions and grants.
#[derive(Debug, Clone)]
pub struct PermissionRepository {
    ctx: RepoContext,
}

impl PermissionRepository {
    pub fn new(ctx: RepoContext) -> Self {
        PermissionRepository { ctx }
    }

    /// Adds a permission to the catalogue.
    pub async fn create(&self, input: &NewPermission) -> DbResult<Permission> {
        input.validate()?;
        debug!(code = %input.code, "Inserting permission");

        bounded(self.ctx.query_timeout, "permissions.create", async {
            Ok(sqlx::query_as::<_, Permission>(
                "INSERT INTO permissions (code, description) VALUES (?, ?) \
                 RETURNING id, code, description",
            )
            .bind(input.code.trim())
            .bind(&input.description)
            .fetch_one(&self.ctx.pool)
            .await?)
        })
        .await
    }

    /// Every catalogued permission, by code.
    pub async fn list_all(&self) -> DbResult<Vec<Permission>> {
        bounded(self.ctx.query_timeout, "permissions.list_all", async {
            Ok(sqlx::query_as::<_, Permission>(
                "SELECT id, code, description FROM permissions ORDER BY code",
            )
            .fetch_all(&self.ctx.pool)
            .await?)
        })
        .await
    }

    /// The codes `user_id` holds. Load once per request and test in memory.
    pub async fn list_codes(&self, user_id: i64) -> DbResult<Permissions> {
        let codes: Vec<String> = bounded(self.ctx.query_timeout, "permissions.list_codes", async {
            Ok(sqlx::query_scalar(
                r#"
                SELECT p.code
                FROM permissions p
                INNER JOIN user_permissions up ON up.permission_id = p.id
                WHERE up.user_id = ?
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.ctx.pool)
            .await?)
        })
        .await?;

        Ok(codes.into_iter().collect())
    }

    /// Grants `codes` to `user_id`. Idempotent.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - a code is not catalogued; nothing granted
    /// * `Err(DbError::ForeignKeyViolation)` - `user_id` does not exist
    pub async fn grant<S: AsRef<str>>(&self, user_id: i64, codes: &[S]) -> DbResult<()> {
        let wanted: BTreeSet<String> = codes.iter().map(|c| c.as_ref().to_string()).collect();
        if wanted.is_empty() {
            return Ok(());
        }
        debug!(user_id, codes = ?wanted, "Granting permissions");

        bounded(self.ctx.query_timeout, "permissions.grant", async {
            let mut tx = self.ctx.pool.begin().await?;

            let mut select =
                QueryBuilder::<Sqlite>::new("SELECT id FROM permissions WHERE code IN (");
            {
                let mut list = select.separated(", ");
                for code in &wanted {
                    list.push_bind(code.clone());
                }
            }
            select.push(")");

            let ids: Vec<i64> = select
                .build_query_scalar()
                .fetch_all(&mut *tx)
                .await?;

            if ids.len() != wanted.len() {
                tx.rollback().await?;
                return Err(DbError::not_found("Permission"));
            }

            let mut insert =
                QueryBuilder::<Sqlite>::new("INSERT INTO user_permissions (user_id, permission_id) ");
            insert.push_values(ids, |mut row, permission_id| {
                row.push_bind(user_id).push_bind(permission_id);
            });
            insert.push(" ON CONFLICT DO NOTHING");
            insert.build().execute(&mut *tx).await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
