//! # cashcow-db: Store Layer for Cash Cow
//!
//! Persistence, authentication and account flows for the Cash Cow livestock
//! marketplace. SQLite through sqlx, every call under a per-operation deadline.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cash Cow Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (Authorization: Bearer ...)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   cashcow-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ Authenticator │    │ AccountService│    │  AppConfig   │  │   │
//! │  │   │  (auth.rs)    │    │ (service.rs)  │    │ (config.rs)  │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           ▼                    ▼                               │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ users, tokens │    │  (embedded)  │  │   │
//! │  │   │               │    │ permissions,  │    │              │  │   │
//! │  │   │ SqlitePool    │    │ breeds,       │    │ 001_identity │  │   │
//! │  │   │               │    │ regions       │    │ 002_catalogue│  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                ▼                               │   │
//! │  │               VersionedStore<E>   ListQuery                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store errors and the client-facing error body
//! - [`versioned`] - Compare-and-swap writes for every mutable table
//! - [`listing`] - Filtered, sorted, paged list queries with a windowed count
//! - [`repository`] - Users, tokens, permissions, breeds, regions
//! - [`auth`] - Bearer authentication and permission gates
//! - [`service`] - Register, activate, login, password reset
//! - [`config`] - File and environment configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cashcow_db::{AppConfig, Authenticator, Database};
//!
//! let config = AppConfig::load(Some(Path::new("cashcow.toml")))?;
//! let db = Database::new(config.to_db_config()).await?;
//!
//! let auth = Authenticator::new(db.clone());
//! let principal = auth.authenticate(headers.get("authorization")).await?;
//! let permissions = auth.permissions_for(&principal).await?;
//! let user = auth.require_permission(&principal, &permissions, "cattle:write")?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod config;
pub mod error;
pub mod listing;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod timeout;
pub mod versioned;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{extract_bearer_token, AuthError, AuthResult, Authenticator};
pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult, ErrorBody, ErrorCode};
pub use pool::{Database, DbConfig};
pub use service::{AccountService, TokenTtls};

// Repository re-exports for convenience
pub use repository::breed::BreedRepository;
pub use repository::permission::PermissionRepository;
pub use repository::region::RegionRepository;
pub use repository::token::TokenRepository;
pub use repository::user::UserRepository;
