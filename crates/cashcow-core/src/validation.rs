//! # Validation Module
//!
//! Input validation utilities for Cash Cow.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Domain type (this module)                                    │
//! │  ├── Required / length / pattern rules                                 │
//! │  └── Every field checked, first failure per field reported             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Store (SQLite)                                               │
//! │  ├── UNIQUE constraints  → DbError::UniqueViolation { field }          │
//! │  └── Foreign keys        → DbError::ForeignKeyViolation                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cashcow_core::validation::{validate_email, validate_required_text, Validator};
//!
//! let mut v = Validator::new();
//! v.record("email", validate_email("farmer@example.com"));
//! v.record("first_name", validate_required_text("", 50));
//!
//! let errors = v.into_result().unwrap_err();
//! assert_eq!(errors.get("first_name"), Some("must be provided"));
//! assert!(errors.get("email").is_none());
//! ```

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ValidationError, ValidationErrors};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum email length in bytes.
pub const MAX_EMAIL_BYTES: usize = 254;

/// Highest page number a list request may ask for.
pub const MAX_PAGE: i64 = 10_000_000;

// =============================================================================
// Validator
// =============================================================================

/// Collects failures across every field of an input.
///
/// ## Example
/// ```rust
/// use cashcow_core::error::ValidationError;
/// use cashcow_core::validation::Validator;
///
/// let mut v = Validator::new();
/// v.check(1 + 1 == 2, "sum", ValidationError::Rule("must add up"));
/// assert!(v.is_valid());
/// ```
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Validator::default()
    }

    /// Records `error` against `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, error: ValidationError) {
        if !ok {
            self.errors.add(field, error);
        }
    }

    /// Records the outcome of a field validator.
    pub fn record(&mut self, field: &str, result: ValidationResult<()>) {
        if let Err(error) = result {
            self.errors.add(field, error);
        }
    }

    /// Records a failure unconditionally.
    pub fn add(&mut self, field: &str, error: ValidationError) {
        self.errors.add(field, error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Finishes validation.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required text field.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `max_chars` characters
pub fn validate_required_text(value: &str, max_chars: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required);
    }
    validate_max_chars(value, max_chars)
}

/// Validates an optional text field's length.
pub fn validate_max_chars(value: &str, max_chars: usize) -> ValidationResult<()> {
    if value.chars().count() > max_chars {
        return Err(ValidationError::TooLong { max: max_chars });
    }
    Ok(())
}

/// Validates a required field measured in bytes.
pub fn validate_required_bytes(value: &str, max_bytes: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required);
    }
    if value.len() > max_bytes {
        return Err(ValidationError::TooManyBytes { max: max_bytes });
    }
    Ok(())
}

fn email_regex() -> &'static Regex {
    static EMAIL_RX: OnceLock<Regex> = OnceLock::new();
    EMAIL_RX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .unwrap_or_else(|e| panic!("email pattern must compile: {e}"))
    })
}

/// Validates an email address.
///
/// ## Rules
/// - Must not be empty
/// - At most 254 bytes
/// - Must match the usual `local@domain` pattern
///
/// ## Example
/// ```rust
/// use cashcow_core::validation::validate_email;
///
/// assert!(validate_email("farmer@example.com").is_ok());
/// assert!(validate_email("not-an-email").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    if email.is_empty() {
        return Err(ValidationError::Required);
    }
    if email.len() > MAX_EMAIL_BYTES {
        return Err(ValidationError::TooManyBytes {
            max: MAX_EMAIL_BYTES,
        });
    }
    if !email_regex().is_match(email) {
        return Err(ValidationError::InvalidFormat {
            reason: "must be a valid email address".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
