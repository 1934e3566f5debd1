//! # Repository Module
//!
//! Database repository implementations for Cash Cow.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service / handler                                                     │
//! │       │                                                                 │
//! │       │  db.users().get_by_email("farmer@example.com")                 │
//! │       ▼                                                                 │
//! │  UserRepository ───────────┐                                           │
//! │  ├── SQL specific to users │ writes delegated to                       │
//! │  └── list via ListQuery    ▼                                           │
//! │                    VersionedStore<User>  (CAS update, soft/hard delete)│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (every call under the per-operation deadline)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Users, password changes, listing
//! - [`TokenRepository`](token::TokenRepository) - Issue, resolve, revoke
//! - [`PermissionRepository`](permission::PermissionRepository) - Catalogue and grants
//! - [`BreedRepository`](breed::BreedRepository) - Breed catalogue
//! - [`RegionRepository`](region::RegionRepository) - Region catalogue

use std::time::Duration;

use sqlx::SqlitePool;

pub mod breed;
pub mod permission;
pub mod region;
pub mod token;
pub mod user;

/// What every repository carries.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub(crate) pool: SqlitePool,
    pub(crate) query_timeout: Duration,
    pub(crate) max_page_size: i64,
}
