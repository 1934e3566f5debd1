//! # Catalogue Entities
//!
//! Breeds and regions. They add no invariants of their own: both are stored
//! through the versioned store and listed through the query contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationErrors;
use crate::filters::Filters;
use crate::validation::{validate_required_bytes, validate_required_text, Validator};

pub const MAX_BREED_NAME_CHARS: usize = 255;
pub const MAX_REGION_NAME_BYTES: usize = 255;
pub const MAX_REGION_CODE_BYTES: usize = 10;

pub const BREED_SORT_SAFELIST: &[&str] = &["id", "name", "created_at", "updated_at"];
pub const REGION_SORT_SAFELIST: &[&str] = &["id", "name", "code", "created_at", "updated_at"];

// =============================================================================
// Breed
// =============================================================================

/// A cattle breed (Mashona, Brahman, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Breed {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Breed {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_breed_name(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct NewBreed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewBreed {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        NewBreed {
            name: name.into(),
            description: description.into(),
            is_active: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_breed_name(&self.name)
    }
}

fn validate_breed_name(name: &str) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.record("name", validate_required_text(name, MAX_BREED_NAME_CHARS));
    v.into_result()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct BreedFilter {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub filters: Filters,
}

// =============================================================================
// Region
// =============================================================================

/// A geographic region listings are filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Region {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_region(&self.name, &self.code)
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct NewRegion {
    pub name: String,
    pub code: String,
}

impl NewRegion {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        NewRegion {
            name: name.into(),
            code: code.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_region(&self.name, &self.code)
    }
}

fn validate_region(name: &str, code: &str) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.record("name", validate_required_bytes(name, MAX_REGION_NAME_BYTES));
    v.record("code", validate_required_bytes(code, MAX_REGION_CODE_BYTES));
    v.into_result()
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct RegionFilter {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(flatten)]
    pub filters: Filters,
}
