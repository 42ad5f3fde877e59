//! Remote table backend abstraction
//!
//! The cloud archive talks to its hosted table through [`TableBackend`]:
//! row CRUD with server-side equality filters, ordering, a case-insensitive
//! substring filter, and a push-based change feed.
//!
//! - [`memory::MemoryTableBackend`] keeps rows in process (tests, offline use).
//! - [`rest::RestTableBackend`] speaks the PostgREST dialect over HTTP.

use crate::error::ArchiveResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

pub mod memory;
pub mod rest;

pub use memory::MemoryTableBackend;
pub use rest::RestTableBackend;

/// A table row: column name to JSON value
pub type Row = Map<String, Value>;

/// Column equality filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether a row satisfies this filter
    ///
    /// String cells compare verbatim; other cells compare by their JSON text.
    pub fn matches(&self, row: &Row) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Select parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    /// Case-insensitive substring match: (column, needle)
    pub ilike: Option<(String, String)>,
    pub order: Option<Order>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn ilike(mut self, column: impl Into<String>, needle: impl Into<String>) -> Self {
        self.ilike = Some((column.into(), needle.into()));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: true,
        });
        self
    }
}

/// A change observed on a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    Inserted { id: String },
    Updated { ids: Vec<String> },
    Deleted { ids: Vec<String> },
    /// Something changed; details unknown (polled feeds)
    Refreshed,
}

/// Row-level CRUD on a hosted table
///
/// Write failures are reported as `StoreWrite`, read failures as
/// `StoreRead`. No operation retries.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Insert a new row; fails if a row with the same `id` exists
    async fn insert(&self, table: &str, row: Row) -> ArchiveResult<()>;

    /// Rows matching the query, in the requested order
    async fn select(&self, table: &str, query: &Query) -> ArchiveResult<Vec<Row>>;

    /// Merge `patch` into every row matching all filters
    ///
    /// # Returns
    ///
    /// Number of rows updated
    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> ArchiveResult<usize>;

    /// Delete every row matching all filters
    ///
    /// # Returns
    ///
    /// Number of rows deleted
    async fn delete(&self, table: &str, filters: &[Filter]) -> ArchiveResult<usize>;

    /// Subscribe to changes on the rows of a table matching `scope`
    ///
    /// A feed may report changes outside the scope, never fewer. It stays
    /// open while at least one receiver is alive.
    async fn subscribe(
        &self,
        table: &str,
        scope: &[Filter],
    ) -> ArchiveResult<broadcast::Receiver<TableChange>>;
}

/// Whether a string cell contains `needle`, ignoring case
///
/// Every character of the needle is literal.
pub(crate) fn cell_contains(row: &Row, column: &str, needle: &str) -> bool {
    row.get(column)
        .and_then(Value::as_str)
        .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// Id column of a row, if present
pub(crate) fn row_id(row: &Row) -> Option<String> {
    row.get("id").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_filter_matches_strings_and_numbers() {
        let r = row(json!({ "id": "a", "owner_id": "u1", "message_count": 3 }));
        assert!(Filter::eq("owner_id", "u1").matches(&r));
        assert!(!Filter::eq("owner_id", "u2").matches(&r));
        assert!(Filter::eq("message_count", "3").matches(&r));
        assert!(!Filter::eq("missing", "x").matches(&r));
    }

    #[test]
    fn test_query_builder() {
        let q = Query::new()
            .eq("owner_id", "u1")
            .ilike("title", "flu")
            .order_desc("saved_at");
        assert_eq!(q.filters, vec![Filter::eq("owner_id", "u1")]);
        assert_eq!(q.ilike, Some(("title".to_string(), "flu".to_string())));
        assert!(q.order.unwrap().descending);
    }
}
