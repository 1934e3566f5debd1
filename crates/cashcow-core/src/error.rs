//! # Error Types
//!
//! Domain-specific error types for cashcow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cashcow-core errors (this file)                                       │
//! │  ├── CoreError         - Hashing, token generation, validation         │
//! │  ├── ValidationError   - One failed rule (message only)                │
//! │  └── ValidationErrors  - field → message map sent back to clients      │
//! │                                                                         │
//! │  cashcow-db errors (separate crate)                                    │
//! │  └── DbError           - Store taxonomy (not-found, conflict, ...)     │
//! │                                                                         │
//! │  Flow: ValidationErrors → CoreError → DbError → ErrorBody → Client     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Validation never stops at the first failure: every field is checked
//!    and the first failing rule per field is reported
//! 3. Errors are enum variants, never String

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation before any hashing or store access.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The password hasher failed for an operational reason.
    ///
    /// ## When This Occurs
    /// - Stored hash is not a parseable PHC string
    /// - Hashing parameters rejected by the algorithm
    ///
    /// A plain mismatch is NOT an error: `verify` returns `Ok(false)`.
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// The OS random source could not produce token bytes.
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    /// A scope tag outside the closed scope set.
    #[error("Unknown token scope: {0}")]
    InvalidScope(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single failed validation rule.
///
/// The message deliberately omits the field name: it is reported as the
/// value of a `field → message` map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("must be provided")]
    Required,

    /// Field value is too short.
    #[error("must be at least {min} characters long")]
    TooShort { min: usize },

    /// Field value is too long.
    #[error("must not be more than {max} characters long")]
    TooLong { max: usize },

    /// Field value exceeds a byte budget.
    #[error("must not be more than {max} bytes long")]
    TooManyBytes { max: usize },

    /// Numeric value is out of range.
    #[error("must be between {min} and {max}")]
    OutOfRange { min: i64, max: i64 },

    /// Invalid format (e.g., email, token shape).
    #[error("{reason}")]
    InvalidFormat { reason: String },

    /// Value is not in allowed set.
    #[error("must be one of: {}", allowed.join(", "))]
    NotAllowed { allowed: Vec<String> },

    /// Free-form rule message.
    #[error("{0}")]
    Rule(&'static str),
}

// =============================================================================
// Validation Errors (field map)
// =============================================================================

/// Field → message map for every field that failed validation.
///
/// ## Serialization
/// ```json
/// { "email": "must be a valid email address", "password": "must contain at least one number" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Creates an empty map.
    pub fn new() -> Self {
        ValidationErrors(BTreeMap::new())
    }

    /// Creates a map holding one failure.
    pub fn single(field: impl Into<String>, error: ValidationError) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        errors
    }

    /// Records a failure unless the field already has one.
    pub fn add(&mut self, field: impl Into<String>, error: ValidationError) {
        self.0.entry(field.into()).or_insert_with(|| error.to_string());
    }

    /// Returns the message recorded for a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for (i, (field, message)) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{field} {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
