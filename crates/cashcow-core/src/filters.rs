//! # List Query Contract
//!
//! Paging state in, a bounded page plus [`MetaData`] out.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Filters { page, page_size, sort: "-created_at" }     (client input)    │
//! │      │                                                                  │
//! │      │ validate(safelist, max_page_size)                                │
//! │      ▼                                                                  │
//! │  PageRequest { sort_column: "created_at", direction: Desc,              │
//! │                limit: page_size, offset: (page-1)*page_size }           │
//! │      │                                                                  │
//! │      │ store: ... ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?     │
//! │      │        COUNT(*) OVER() in the same statement                     │
//! │      ▼                                                                  │
//! │  MetaData::calculate(total_records, page, page_size)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `sort_column` is always a `&'static str` taken from the safelist, so it
//! can be spliced into SQL without quoting concerns.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationErrors};
use crate::validation::{Validator, MAX_PAGE};

pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Upper bound on `page_size` when no configuration overrides it.
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// Filters (client input)
// =============================================================================

/// Generic paging state attached to every list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    /// Column name, optionally prefixed with `-` for descending.
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Filters {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: "id".to_string(),
        }
    }
}

impl Filters {
    pub fn new(page: i64, page_size: i64, sort: impl Into<String>) -> Self {
        Filters {
            page,
            page_size,
            sort: sort.into(),
        }
    }

    /// Checks the paging state and resolves the sort key.
    ///
    /// ## Arguments
    /// * `safelist` - sortable columns; each may also be requested as `-col`
    /// * `max_page_size` - configured ceiling for `page_size`
    pub fn validate(
        &self,
        safelist: &'static [&'static str],
        max_page_size: i64,
    ) -> Result<PageRequest, ValidationErrors> {
        let mut v = Validator::new();

        v.check(
            (1..=MAX_PAGE).contains(&self.page),
            "page",
            ValidationError::OutOfRange {
                min: 1,
                max: MAX_PAGE,
            },
        );
        v.check(
            (1..=max_page_size).contains(&self.page_size),
            "page_size",
            ValidationError::OutOfRange {
                min: 1,
                max: max_page_size,
            },
        );

        let (requested, direction) = match self.sort.strip_prefix('-') {
            Some(column) => (column, SortDirection::Desc),
            None => (self.sort.as_str(), SortDirection::Asc),
        };
        let sort_column = safelist.iter().copied().find(|c| *c == requested);

        if sort_column.is_none() {
            v.add(
                "sort",
                ValidationError::NotAllowed {
                    allowed: safelist
                        .iter()
                        .flat_map(|c| [c.to_string(), format!("-{c}")])
                        .collect(),
                },
            );
        }

        v.into_result()?;

        Ok(PageRequest {
            page: self.page,
            page_size: self.page_size,
            sort_column: sort_column.unwrap_or("id"),
            direction,
        })
    }
}

// =============================================================================
// Page Request (validated)
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Paging state that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
    pub sort_column: &'static str,
    pub direction: SortDirection,
}

impl PageRequest {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

// =============================================================================
// MetaData (response)
// =============================================================================

/// Paging summary returned beside every list page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MetaData {
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total_records: i64,
}

impl MetaData {
    /// Builds metadata from the windowed count.
    ///
    /// Zero matching records yields all-zero metadata. That is an empty
    /// page, not an error.
    ///
    /// ## Example
    /// ```rust
    /// use cashcow_core::filters::MetaData;
    ///
    /// let meta = MetaData::calculate(25, 2, 10);
    /// assert_eq!(meta.total_pages, 3);
    /// assert_eq!(MetaData::calculate(0, 4, 10), MetaData::default());
    /// ```
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> MetaData {
        if total_records <= 0 || page_size <= 0 {
            return MetaData::default();
        }
        MetaData {
            page,
            page_size,
            total_pages: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAFELIST: &[&str] = &["id", "email", "created_at"];

    #[test]
    fn test_defaults_are_valid() {
        let req = Filters::default().validate(SAFELIST, 100).unwrap();
        assert_eq!(req.sort_column, "id");
        assert_eq!(req.direction, SortDirection::Asc);
        assert_eq!(req.limit(), 20);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_descending_prefix() {
        let req = Filters::new(3, 10, "-created_at")
            .validate(SAFELIST, 100)
            .unwrap();
        assert_eq!(req.sort_column, "created_at");
        assert_eq!(req.direction.as_sql(), "DESC");
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn test_unknown_sort_rejected() {
        let errors = Filters::new(1, 10, "password_hash")
            .validate(SAFELIST, 100)
            .unwrap_err();
        assert_eq!(
            errors.get("sort"),
            Some("must be one of: id, -id, email, -email, created_at, -created_at")
        );
    }

    #[test]
    fn test_sql_injection_in_sort_rejected() {
        assert!(Filters::new(1, 10, "id; DROP TABLE users")
            .validate(SAFELIST, 100)
            .is_err());
    }

    #[test]
    fn test_page_bounds() {
        let errors = Filters::new(0, 101, "id").validate(SAFELIST, 100).unwrap_err();
        assert_eq!(errors.get("page"), Some("must be between 1 and 10000000"));
        assert_eq!(errors.get("page_size"), Some("must be between 1 and 100"));

        assert!(Filters::new(MAX_PAGE, 100, "id").validate(SAFELIST, 100).is_ok());
        assert!(Filters::new(MAX_PAGE + 1, 10, "id").validate(SAFELIST, 100).is_err());
    }

    #[test]
    fn test_configured_max_page_size() {
        assert!(Filters::new(1, 50, "id").validate(SAFELIST, 25).is_err());
    }

    #[test]
    fn test_metadata() {
        assert_eq!(
            MetaData::calculate(25, 2, 10),
            MetaData {
                page: 2,
                page_size: 10,
                total_pages: 3,
                total_records: 25
            }
        );
        assert_eq!(MetaData::calculate(20, 1, 10).total_pages, 2);
        assert_eq!(MetaData::calculate(1, 1, 10).total_pages, 1);
        assert_eq!(MetaData::calculate(0, 1, 10), MetaData::default());
    }
}
