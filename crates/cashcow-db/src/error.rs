//! # Database Error Types
//!
//! The store's error taxonomy and its client-facing projection.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (validation, hashing)      │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ← named: not-found, edit-conflict,              │
//! │       │                   already-deleted, duplicate, foreign-key,     │
//! │       │                   validation, timeout, infrastructure          │
//! │       ▼                                                                 │
//! │  ErrorBody ← stable code + HTTP status + public message                │
//! │       │      (infrastructure detail never leaves the process)          │
//! │       ▼                                                                 │
//! │  HTTP layer                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Not-found, conflict and duplicate are expected outcomes. The store returns
//! them without logging.

use std::collections::BTreeMap;

use cashcow_core::{CoreError, ValidationErrors};
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Zero rows returned or affected.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A versioned write matched no row: the stored version moved on, or the
    /// row is gone. The two cannot be told apart.
    #[error("{entity} {id} was modified concurrently")]
    EditConflict { entity: &'static str, id: i64 },

    /// Soft delete of a row that is already soft-deleted.
    #[error("{entity} {id} is already deleted")]
    AlreadyDeleted { entity: &'static str, id: i64 },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Registering a second user with the same email, farmer id or phone
    /// - Duplicate breed name, region name or region code
    #[error("Duplicate {field}")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Granting a permission to a user id that does not exist
    /// - Hard-deleting a row other rows still reference
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Input rejected before any store access.
    #[error(transparent)]
    Validation(ValidationErrors),

    /// The password hasher or token generator failed.
    #[error("Credential operation failed: {0}")]
    Hashing(String),

    /// The per-operation deadline elapsed; the in-flight call was dropped.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: &'static str) -> Self {
        DbError::NotFound { entity }
    }

    pub fn duplicate(field: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
        }
    }

    /// Builds a validation error for a single field.
    pub fn invalid(field: &str, error: cashcow_core::ValidationError) -> Self {
        DbError::Validation(ValidationErrors::single(field, error))
    }

    /// True for failures a caller may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Timeout { .. } | DbError::ConnectionFailed(_) | DbError::PoolExhausted
        )
    }
}

/// Column named in `UNIQUE constraint failed: users.email`.
fn unique_field(message: &str) -> String {
    message
        .split("UNIQUE constraint failed: ")
        .nth(1)
        .and_then(|cols| cols.split(',').next())
        .map(|col| col.trim())
        .map(|col| col.rsplit('.').next().unwrap_or(col).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → by ErrorKind (unique / foreign key / other)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound { entity: "Record" },

            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => DbError::UniqueViolation {
                    field: unique_field(db_err.message()),
                },
                ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                    message: db_err.message().to_string(),
                },
                _ => DbError::QueryFailed(db_err.message().to_string()),
            },

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationErrors> for DbError {
    fn from(errors: ValidationErrors) -> Self {
        DbError::Validation(errors)
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => DbError::Validation(errors),
            CoreError::HashingFailed(e) | CoreError::TokenGeneration(e) => DbError::Hashing(e),
            CoreError::InvalidScope(scope) => DbError::Internal(format!("unknown scope {scope}")),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Client-Facing Error Body
// =============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 404
    NotFound,
    /// 409
    EditConflict,
    /// 409
    AlreadyDeleted,
    /// 409
    DuplicateValue,
    /// 409
    ConstraintViolation,
    /// 422
    ValidationFailed,
    /// 401
    InvalidAuthenticationToken,
    /// 401
    AuthenticationRequired,
    /// 401
    InvalidCredentials,
    /// 403
    InactiveAccount,
    /// 403
    PermissionDenied,
    /// 504
    Timeout,
    /// 503
    Unavailable,
    /// 500
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::EditConflict
            | ErrorCode::AlreadyDeleted
            | ErrorCode::DuplicateValue
            | ErrorCode::ConstraintViolation => 409,
            ErrorCode::ValidationFailed => 422,
            ErrorCode::InvalidAuthenticationToken
            | ErrorCode::AuthenticationRequired
            | ErrorCode::InvalidCredentials => 401,
            ErrorCode::InactiveAccount | ErrorCode::PermissionDenied => 403,
            ErrorCode::Timeout => 504,
            ErrorCode::Unavailable => 503,
            ErrorCode::Internal => 500,
        }
    }
}

/// What a client receives when an operation fails.
///
/// ```json
/// { "code": "VALIDATION_FAILED", "message": "...", "fields": { "email": "must be provided" } }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ErrorBody {
            code,
            message: message.into(),
            fields: None,
        }
    }

    pub fn status(&self) -> u16 {
        self.code.http_status()
    }
}

impl From<&DbError> for ErrorBody {
    fn from(err: &DbError) -> Self {
        match err {
            DbError::NotFound { .. } => {
                ErrorBody::new(ErrorCode::NotFound, "the requested resource could not be found")
            }
            DbError::EditConflict { .. } => ErrorBody::new(
                ErrorCode::EditConflict,
                "unable to update the record due to an edit conflict, please try again",
            ),
            DbError::AlreadyDeleted { .. } => {
                ErrorBody::new(ErrorCode::AlreadyDeleted, "the record has already been deleted")
            }
            DbError::UniqueViolation { field } => {
                let mut body = ErrorBody::new(ErrorCode::DuplicateValue, "duplicate value");
                body.fields = Some(BTreeMap::from([(
                    field.clone(),
                    "a record with this value already exists".to_string(),
                )]));
                body
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!(%message, "Foreign key violation");
                ErrorBody::new(
                    ErrorCode::ConstraintViolation,
                    "the record references, or is referenced by, another record",
                )
            }
            DbError::Validation(errors) => {
                let mut body = ErrorBody::new(ErrorCode::ValidationFailed, "validation failed");
                body.fields = Some(errors.as_map().clone());
                body
            }
            DbError::Timeout { operation } => {
                tracing::error!(operation, "Store operation timed out");
                ErrorBody::new(ErrorCode::Timeout, "the operation timed out, please retry")
            }
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                tracing::error!(error = %err, "Database unavailable");
                ErrorBody::new(ErrorCode::Unavailable, "the service is temporarily unavailable")
            }
            DbError::Hashing(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Internal(_) => {
                tracing::error!(error = %err, "Internal store error");
                ErrorBody::new(
                    ErrorCode::Internal,
                    "the server encountered a problem and could not process your request",
                )
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
