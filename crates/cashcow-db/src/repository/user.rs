//! # User Repository
//!
//! Users: registration, lookups, versioned updates, password changes,
//! soft/hard delete and the filtered list.
//!
//! ## Write Paths
//! ```text
//! create(NewUser)          validate ─► hash ─► INSERT ... RETURNING *
//! update(&mut User)        validate ─► VersionedStore::update        (CAS, all flags)
//! change_password(..)      policy ─► hash ─► password_hash only      (CAS)
//! soft_delete(&mut User)   VersionedStore::soft_delete               (CAS)
//! hard_delete(id)          DELETE, tokens and grants cascade
//! ```

use chrono::Utc;
use sqlx::query_builder::Separated;
use sqlx::Sqlite;
use tracing::debug;

use cashcow_core::user::USER_SORT_SAFELIST;
use cashcow_core::{
    CandidatePassword, MetaData, NewUser, PasswordCredential, PasswordHasher, User, UserFilter,
};

use crate::error::{DbError, DbResult};
use crate::listing::ListQuery;
use crate::repository::RepoContext;
use crate::timeout::bounded;
use crate::versioned::{SoftDelete, VersionStamp, Versioned, VersionedStore};

const USER_COLUMNS: &str = "id, farmer_id, email, phone_number, first_name, last_name, \
     middle_name, password_hash, is_activated, is_deleted, is_verified, version, \
     created_at, updated_at";

// =============================================================================
// Versioned Mapping
// =============================================================================

impl Versioned for User {
    const TABLE: &'static str = "users";
    const ENTITY: &'static str = "User";

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
        set.push("farmer_id = ");
        set.push_bind_unseparated(self.farmer_id.clone());
        set.push("email = ");
        set.push_bind_unseparated(self.email.clone());
        set.push("phone_number = ");
        set.push_bind_unseparated(self.phone_number.clone());
        set.push("first_name = ");
        set.push_bind_unseparated(self.first_name.clone());
        set.push("last_name = ");
        set.push_bind_unseparated(self.last_name.clone());
        set.push("middle_name = ");
        set.push_bind_unseparated(self.middle_name.clone());
        set.push("is_activated = ");
        set.push_bind_unseparated(self.is_activated);
        set.push("is_deleted = ");
        set.push_bind_unseparated(self.is_deleted);
        set.push("is_verified = ");
        set.push_bind_unseparated(self.is_verified);
    }
}

impl SoftDelete for User {
    fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    ctx: RepoContext,
    store: VersionedStore<User>,
}

impl UserRepository {
    pub fn new(ctx: RepoContext) -> Self {
        let store = VersionedStore::new(ctx.pool.clone(), ctx.query_timeout);
        UserRepository { ctx, store }
    }

    /// Validates, hashes and inserts a new user.
    ///
    /// ## Returns
    /// * `Err(DbError::Validation)` - any field, including the password policy
    /// * `Err(DbError::UniqueViolation)` - `farmer_id`, `email` or `phone_number` taken
    pub async fn create(&self, input: &NewUser, hasher: &PasswordHasher) -> DbResult<User> {
        input.validate()?;
        let credential = hasher.hash(&input.password)?;
        self.insert(input, &credential).await
    }

    async fn insert(&self, input: &NewUser, credential: &PasswordCredential) -> DbResult<User> {
        assert!(
            !credential.is_empty(),
            "attempted to persist a user without a password hash"
        );
        debug!(email = %input.email, "Inserting user");

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (farmer_id, email, phone_number, first_name, last_name, \
             middle_name, password_hash, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        );

        bounded(self.ctx.query_timeout, "users.insert", async {
            Ok(sqlx::query_as::<_, User>(&sql)
                .bind(blank_to_none(&input.farmer_id))
                .bind(&input.email)
                .bind(blank_to_none(&input.phone_number))
                .bind(&input.first_name)
                .bind(&input.last_name)
                .bind(&input.middle_name)
                .bind(credential)
                .bind(now)
                .bind(now)
                .fetch_one(&self.ctx.pool)
                .await?)
        })
        .await
    }

    /// Gets a user by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<User> {
        self.store.get(id).await
    }

    /// Gets a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> DbResult<User> {
        self.get_by("email", email.to_string(), "users.get_by_email")
            .await
    }

    /// Gets a user by farmer id.
    pub async fn get_by_farmer_id(&self, farmer_id: &str) -> DbResult<User> {
        self.get_by("farmer_id", farmer_id.to_string(), "users.get_by_farmer_id")
            .await
    }

    async fn get_by(&self, column: &str, value: String, operation: &'static str) -> DbResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        bounded(self.ctx.query_timeout, operation, async {
            sqlx::query_as::<_, User>(&sql)
                .bind(value)
                .fetch_optional(&self.ctx.pool)
                .await?
                .ok_or(DbError::not_found(User::ENTITY))
        })
        .await
    }

    /// Writes profile fields and flags, conditioned on `user.version`.
    ///
    /// On success `user.version` and `user.updated_at` reflect the store.
    pub async fn update(&self, user: &mut User) -> DbResult<()> {
        user.validate()?;
        user.farmer_id = blank_to_none(&user.farmer_id);
        user.phone_number = blank_to_none(&user.phone_number);
        self.store.update(user).await
    }

    /// Re-hashes and stores a new password, conditioned on `user.version`.
    pub async fn change_password(
        &self,
        user: &mut User,
        candidate: &CandidatePassword,
        hasher: &PasswordHasher,
    ) -> DbResult<()> {
        let credential = hasher.hash(candidate)?;
        assert!(
            !credential.is_empty(),
            "attempted to persist a user without a password hash"
        );

        let bound = credential.clone();
        self.store
            .update_columns(user, move |set| {
                set.push("password_hash = ");
                set.push_bind_unseparated(bound);
            })
            .await?;

        user.password = credential;
        Ok(())
    }

    /// Marks the user deleted. See [`VersionedStore::soft_delete`].
    pub async fn soft_delete(&self, user: &mut User) -> DbResult<()> {
        self.store.soft_delete(user).await
    }

    /// Removes the user row. Tokens and grants go with it.
    pub async fn hard_delete(&self, id: i64) -> DbResult<()> {
        self.store.hard_delete(id).await
    }

    /// Filtered, sorted, paged list of users.
    pub async fn list(&self, filter: &UserFilter) -> DbResult<(Vec<User>, MetaData)> {
        let page = filter
            .filters
            .validate(USER_SORT_SAFELIST, self.ctx.max_page_size)?;

        let mut query = ListQuery::new("users", USER_COLUMNS);
        query
            .contains("farmer_id", filter.farmer_id.as_deref())
            .contains("email", filter.email.as_deref())
            .contains("phone_number", filter.phone_number.as_deref())
            .contains_any(
                &["first_name", "middle_name", "last_name"],
                filter.name.as_deref(),
            )
            .eq("is_activated", filter.is_activated)
            .eq("is_deleted", filter.is_deleted)
            .eq("is_verified", filter.is_verified);

        query
            .fetch_page(&self.ctx.pool, self.ctx.query_timeout, "users.list", &page)
            .await
    }
}

/// Empty identifiers are stored as NULL so they never collide on UNIQUE.
fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================
