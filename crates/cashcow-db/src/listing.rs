//! # List Queries
//!
//! Builds filtered, sorted, paged `SELECT`s with the total count computed
//! in the same statement.
//!
//! ```text
//! SELECT COUNT(*) OVER() AS total_records, <columns>
//!   FROM <table>
//!  WHERE <only the filters that were supplied>
//!  ORDER BY <safelisted column> <ASC|DESC>, id ASC
//!  LIMIT ? OFFSET ?
//! ```
//!
//! Absent or blank filter values add no predicate. The `id ASC` tie-break
//! keeps pages stable when the sort column has duplicates.

use std::time::Duration;

use cashcow_core::{MetaData, PageRequest};
use sqlx::sqlite::SqliteRow;
use sqlx::{Encode, FromRow, QueryBuilder, Row, Sqlite, SqlitePool, Type};

use crate::error::DbResult;
use crate::timeout::bounded;

/// A row plus the window count that rode along with it.
#[derive(Debug)]
struct Windowed<T> {
    total_records: i64,
    item: T,
}

impl<'r, T> FromRow<'r, SqliteRow> for Windowed<T>
where
    T: FromRow<'r, SqliteRow>,
{
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Windowed {
            total_records: row.try_get("total_records")?,
            item: T::from_row(row)?,
        })
    }
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Non-blank filter text, trimmed.
fn supplied(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Incremental builder for one list query.
pub struct ListQuery {
    qb: QueryBuilder<'static, Sqlite>,
    has_predicate: bool,
}

impl ListQuery {
    /// Starts `SELECT COUNT(*) OVER() AS total_records, <columns> FROM <table>`.
    pub fn new(table: &str, columns: &str) -> Self {
        ListQuery {
            qb: QueryBuilder::new(format!(
                "SELECT COUNT(*) OVER() AS total_records, {columns} FROM {table}"
            )),
            has_predicate: false,
        }
    }

    fn next_clause(&mut self) {
        self.qb
            .push(if self.has_predicate { " AND " } else { " WHERE " });
        self.has_predicate = true;
    }

    /// `column = ?` when `value` is present.
    pub fn eq<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'static + Encode<'static, Sqlite> + Type<Sqlite> + Send,
    {
        if let Some(value) = value {
            self.next_clause();
            self.qb.push(column).push(" = ").push_bind(value);
        }
        self
    }

    /// Case-insensitive substring match on one column.
    pub fn contains(&mut self, column: &str, needle: Option<&str>) -> &mut Self {
        self.contains_any(&[column], needle)
    }

    /// Case-insensitive substring match on any of `columns`.
    ///
    /// SQLite's `LOWER` folds ASCII only, so the needle is folded the same
    /// way. Non-ASCII letters match in their stored case.
    pub fn contains_any(&mut self, columns: &[&str], needle: Option<&str>) -> &mut Self {
        let Some(needle) = supplied(needle) else {
            return self;
        };
        let pattern = format!("%{}%", escape_like(&needle.to_ascii_lowercase()));

        self.next_clause();
        self.qb.push("(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.qb.push(" OR ");
            }
            self.qb
                .push(format!("LOWER(COALESCE({column}, '')) LIKE "))
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'");
        }
        self.qb.push(")");
        self
    }

    /// Appends ordering and the page window, runs the query, and builds
    /// metadata from the window count.
    pub async fn fetch_page<T>(
        mut self,
        pool: &SqlitePool,
        timeout: Duration,
        operation: &'static str,
        page: &PageRequest,
    ) -> DbResult<(Vec<T>, MetaData)>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        self.qb
            .push(format!(
                " ORDER BY {} {}, id ASC LIMIT ",
                page.sort_column,
                page.direction.as_sql()
            ))
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<Windowed<T>> = bounded(timeout, operation, async {
            Ok(self.qb.build_query_as().fetch_all(pool).await?)
        })
        .await?;

        let total_records = rows.first().map(|r| r.total_records).unwrap_or(0);
        let meta = MetaData::calculate(total_records, page.page, page.page_size);
        let items = rows.into_iter().map(|r| r.item).collect();

        Ok((items, meta))
    }

    /// The SQL built so far.
    pub fn sql(&self) -> &str {
        self.qb.sql()
    }
}
