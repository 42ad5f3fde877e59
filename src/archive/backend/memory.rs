//! In-process table backend
//!
//! Rows live in a mutex-guarded map of tables. Every write publishes a
//! [`TableChange`] on the table's broadcast channel, mirroring the push
//! subscriptions of a hosted backend. The backend can be switched offline
//! to exercise failure paths.

use super::{cell_contains, row_id, Filter, Query, Row, TableBackend, TableChange};
use crate::error::{ArchiveResult, MedibotError};
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 64;

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    feeds: HashMap<String, broadcast::Sender<TableChange>>,
}

impl Tables {
    fn publish(&mut self, table: &str, change: TableChange) {
        if let Some(tx) = self.feeds.get(table) {
            // No receivers is fine.
            let _ = tx.send(change);
        }
    }
}

/// Table backend holding rows in memory
///
/// # Examples
///
/// ```
/// use medibot::archive::backend::{MemoryTableBackend, Query, TableBackend};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let backend = MemoryTableBackend::new();
/// let row = json!({ "id": "a", "title": "Flu" }).as_object().unwrap().clone();
/// backend.insert("saved_chats", row).await.unwrap();
///
/// let rows = backend.select("saved_chats", &Query::new().eq("id", "a")).await.unwrap();
/// assert_eq!(rows.len(), 1);
/// # });
/// ```
#[derive(Default)]
pub struct MemoryTableBackend {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryTableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Insert a row without any validation or change notification
    ///
    /// Used to seed rows that a well-behaved writer would never produce.
    pub fn insert_raw(&self, table: &str, row: Row) {
        self.lock().rows.entry(table.to_string()).or_default().push(row);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave rows half-written.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_read(&self) -> ArchiveResult<()> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(MedibotError::StoreRead("backend is offline".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> ArchiveResult<()> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(MedibotError::StoreWrite("backend is offline".to_string()));
        }
        Ok(())
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

/// Compare two cells: timestamps chronologically, numbers numerically,
/// everything else by text
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl TableBackend for MemoryTableBackend {
    async fn insert(&self, table: &str, row: Row) -> ArchiveResult<()> {
        self.check_write()?;
        let id = row_id(&row)
            .ok_or_else(|| MedibotError::StoreWrite("row has no string `id`".to_string()))?;

        let mut tables = self.lock();
        let rows = tables.rows.entry(table.to_string()).or_default();
        if rows.iter().any(|r| row_id(r).as_deref() == Some(id.as_str())) {
            return Err(MedibotError::StoreWrite(format!(
                "duplicate key: row {} already exists",
                id
            )));
        }
        rows.push(row);
        tables.publish(table, TableChange::Inserted { id });
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query) -> ArchiveResult<Vec<Row>> {
        self.check_read()?;
        let tables = self.lock();
        let mut rows: Vec<Row> = tables
            .rows
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, &query.filters))
                    .filter(|r| match &query.ilike {
                        Some((column, needle)) => cell_contains(r, column, needle),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_cells(a.get(&order.column), b.get(&order.column));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        Ok(rows)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> ArchiveResult<usize> {
        self.check_write()?;
        let mut tables = self.lock();
        let mut ids = Vec::new();
        if let Some(rows) = tables.rows.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches_all(r, filters)) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                ids.extend(row_id(row));
            }
        }

        let updated = ids.len();
        if updated > 0 {
            tables.publish(table, TableChange::Updated { ids });
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> ArchiveResult<usize> {
        self.check_write()?;
        let mut tables = self.lock();
        let mut ids = Vec::new();
        if let Some(rows) = tables.rows.get_mut(table) {
            rows.retain(|r| {
                if matches_all(r, filters) {
                    ids.extend(row_id(r));
                    false
                } else {
                    true
                }
            });
        }

        let deleted = ids.len();
        if deleted > 0 {
            tables.publish(table, TableChange::Deleted { ids });
        }
        Ok(deleted)
    }

    /// One feed per table; `scope` is not applied to notifications
    async fn subscribe(
        &self,
        table: &str,
        _scope: &[Filter],
    ) -> ArchiveResult<broadcast::Receiver<TableChange>> {
        self.check_read()?;
        let mut tables = self.lock();
        let tx = tables
            .feeds
            .entry(table.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CAPACITY).0);
        Ok(tx.subscribe())
    }
}
