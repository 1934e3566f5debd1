//! # Permissions
//!
//! Flat capability codes (`cattle:write`, `users:read`, ...) with no
//! hierarchy. A user's codes are loaded once per request into
//! [`Permissions`] and tested in memory.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationErrors;
use crate::validation::{validate_max_chars, validate_required_text, Validator};

pub const MAX_CODE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A catalogued permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Permission {
    pub id: i64,
    pub code: String,
    pub description: String,
}

/// Input for adding a permission to the catalogue.
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct NewPermission {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl NewPermission {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        NewPermission {
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.record("code", validate_required_text(&self.code, MAX_CODE_CHARS));
        v.record(
            "description",
            validate_max_chars(&self.description, MAX_DESCRIPTION_CHARS),
        );
        v.into_result()
    }
}

/// The set of codes a user holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn new() -> Self {
        Permissions::default()
    }

    /// Membership test. No I/O.
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for Permissions {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Permissions(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes() {
        let perms: Permissions = ["cattle:read".to_string(), "cattle:write".to_string()]
            .into_iter()
            .collect();

        assert!(perms.includes("cattle:write"));
        assert!(!perms.includes("users:write"));
        assert!(!Permissions::new().includes("cattle:read"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let perms: Permissions = ["a".to_string(), "a".to_string()].into_iter().collect();
        assert_eq!(perms.len(), 1);
    }

    #[test]
    fn test_new_permission_validation() {
        assert!(NewPermission::new("cattle:read", "Read cattle").validate().is_ok());

        let errors = NewPermission::new("", "x".repeat(501)).validate().unwrap_err();
        assert_eq!(errors.get("code"), Some("must be provided"));
        assert_eq!(
            errors.get("description"),
            Some("must not be more than 500 characters long")
        );

        let errors = NewPermission::new("c".repeat(101), "").validate().unwrap_err();
        assert_eq!(
            errors.get("code"),
            Some("must not be more than 100 characters long")
        );
    }
}
