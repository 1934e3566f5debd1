//! # User
//!
//! The identity aggregate.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ User                         │
//! │ ──────────────────────────── │
//! │ id            (immutable)    │
//! │ farmer_id     UNIQUE, opt    │
//! │ email         UNIQUE         │
//! │ phone_number  UNIQUE, opt    │
//! │ first/last/middle name       │
//! │ password      PHC only       │
//! │ is_activated / is_deleted /  │
//! │ is_verified                  │
//! │ version       +1 per write   │
//! │ created_at / updated_at      │
//! └──────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::credential::{CandidatePassword, PasswordCredential};
use crate::error::ValidationErrors;
use crate::filters::Filters;
use crate::validation::{validate_email, validate_max_chars, validate_required_text, Validator};

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_FARMER_ID_CHARS: usize = 50;
pub const MAX_PHONE_CHARS: usize = 15;

/// Columns a user list may be sorted by.
pub const USER_SORT_SAFELIST: &[&str] = &[
    "id",
    "farmer_id",
    "email",
    "first_name",
    "last_name",
    "created_at",
    "updated_at",
];

// =============================================================================
// User
// =============================================================================

/// A persisted user.
///
/// `password` never serializes. Mutations go through the versioned store,
/// which bumps `version` and `updated_at`.
#[derive(Debug, Clone, Serialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub farmer_id: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,

    #[serde(skip)]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "password_hash"))]
    pub password: PasswordCredential,

    pub is_activated: bool,
    pub is_deleted: bool,
    pub is_verified: bool,
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Validates the profile fields. The stored hash is not checked here.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        check_profile(
            &mut v,
            Profile {
                farmer_id: self.farmer_id.as_deref(),
                email: &self.email,
                phone_number: self.phone_number.as_deref(),
                first_name: &self.first_name,
                last_name: &self.last_name,
                middle_name: &self.middle_name,
            },
        );
        v.into_result()
    }

    /// `"First Last"`, for log lines and greetings.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// =============================================================================
// New User
// =============================================================================

/// Registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub farmer_id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub password: CandidatePassword,
}

impl NewUser {
    /// Validates every field, including the password policy.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        check_profile(
            &mut v,
            Profile {
                farmer_id: self.farmer_id.as_deref(),
                email: &self.email,
                phone_number: self.phone_number.as_deref(),
                first_name: &self.first_name,
                last_name: &self.last_name,
                middle_name: &self.middle_name,
            },
        );
        v.record("password", self.password.check());
        v.into_result()
    }
}

struct Profile<'a> {
    farmer_id: Option<&'a str>,
    email: &'a str,
    phone_number: Option<&'a str>,
    first_name: &'a str,
    last_name: &'a str,
    middle_name: &'a str,
}

fn check_profile(v: &mut Validator, p: Profile<'_>) {
    v.record("first_name", validate_required_text(p.first_name, MAX_NAME_CHARS));
    v.record("last_name", validate_required_text(p.last_name, MAX_NAME_CHARS));
    v.record("middle_name", validate_max_chars(p.middle_name, MAX_NAME_CHARS));
    if let Some(farmer_id) = p.farmer_id {
        v.record("farmer_id", validate_max_chars(farmer_id, MAX_FARMER_ID_CHARS));
    }
    if let Some(phone) = p.phone_number {
        v.record("phone_number", validate_max_chars(phone, MAX_PHONE_CHARS));
    }
    v.record("email", validate_email(p.email));
}

// =============================================================================
// User Filter
// =============================================================================

/// List filter for users. Absent fields do not constrain the result.
///
/// Text fields match case-insensitive substrings; `name` matches any of the
/// first, middle or last name.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct UserFilter {
    pub farmer_id: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub name: Option<String>,
    pub is_activated: Option<bool>,
    pub is_deleted: Option<bool>,
    pub is_verified: Option<bool>,
    #[serde(flatten)]
    pub filters: Filters,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            farmer_id: Some("FRM-001".into()),
            email: "tendai@example.com".into(),
            phone_number: Some("+263771234567".into()),
            first_name: "Tendai".into(),
            last_name: "Moyo".into(),
            middle_name: String::new(),
            password: CandidatePassword::new("Pa55word!"),
        }
    }

    #[test]
    fn test_valid_new_user() {
        assert!(new_user().validate().is_ok());
    }

    #[test]
    fn test_new_user_reports_every_bad_field() {
        let mut input = new_user();
        input.first_name = String::new();
        input.email = "nope".into();
        input.phone_number = Some("0".repeat(16));
        input.password = CandidatePassword::new("short");

        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors.get("first_name"), Some("must be provided"));
        assert_eq!(errors.get("email"), Some("must be a valid email address"));
        assert_eq!(
            errors.get("phone_number"),
            Some("must not be more than 15 characters long")
        );
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn test_optional_identifiers() {
        let mut input = new_user();
        input.farmer_id = None;
        input.phone_number = None;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_deserialize_new_user_defaults() {
        let json = r#"{
            "email": "a@b.co",
            "first_name": "A",
            "last_name": "B",
            "password": "Pa55word!"
        }"#;
        let input: NewUser = serde_json::from_str(json).unwrap();
        assert!(input.farmer_id.is_none());
        assert_eq!(input.middle_name, "");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_user_filter_flattens_paging() {
        let json = r#"{ "name": "moyo", "is_activated": true, "page": 2, "sort": "-email" }"#;
        let filter: UserFilter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.name.as_deref(), Some("moyo"));
        assert_eq!(filter.is_activated, Some(true));
        assert_eq!(filter.is_deleted, None);
        assert_eq!(filter.filters.page, 2);
        assert_eq!(filter.filters.page_size, 20);
        assert_eq!(filter.filters.sort, "-email");
    }
}
