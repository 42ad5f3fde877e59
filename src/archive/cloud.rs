//! Authoritative, principal-scoped transcript store
//!
//! Every operation filters (or stamps) rows with the current principal's
//! id, so ownership is enforced by the backend's equality filters rather
//! than by trusting the client. With nobody signed in, read paths return
//! empty results and write paths fail with `NotAuthenticated`.

use super::backend::{row_id, Filter, Query, Row, TableBackend};
use super::listing::Listing;
use super::transcript::{Transcript, ROW_FIELDS};
use super::watch::TranscriptWatch;
use super::TranscriptArchive;
use crate::auth::AuthProvider;
use crate::error::{ArchiveResult, MedibotError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Cloud-table transcript store
#[derive(Clone)]
pub struct CloudStore {
    pub(crate) backend: Arc<dyn TableBackend>,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) table: String,
}

impl CloudStore {
    /// Create a store over `table` on the given backend
    pub fn new(
        backend: Arc<dyn TableBackend>,
        auth: Arc<dyn AuthProvider>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            auth,
            table: table.into(),
        }
    }

    pub(crate) fn owner(&self) -> Option<String> {
        self.auth.current_principal().map(|p| p.id)
    }

    fn require_owner(&self) -> ArchiveResult<String> {
        self.owner().ok_or(MedibotError::NotAuthenticated)
    }

    fn owned_by(owner: &str) -> Query {
        Query::new()
            .eq(ROW_FIELDS.owner_id, owner)
            .order_desc(ROW_FIELDS.saved_at)
    }

    fn scoped(id: &str, owner: &str) -> [Filter; 2] {
        [
            Filter::eq(ROW_FIELDS.id, id),
            Filter::eq(ROW_FIELDS.owner_id, owner),
        ]
    }

    async fn fetch(&self, query: &Query) -> ArchiveResult<Listing> {
        let rows = self.backend.select(&self.table, query).await?;
        let mut listing = Listing::new();
        for row in rows {
            let key = row_id(&row).unwrap_or_else(|| "<no id>".to_string());
            listing.push(key, decode_row(row));
        }
        Ok(listing)
    }

    /// Live view of the principal's transcripts
    ///
    /// The returned stream yields the full list immediately, then again
    /// after every change to the table or to the signed-in principal. It
    /// ends only when cancelled or dropped.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures::StreamExt;
    /// use medibot::archive::CloudStore;
    ///
    /// # async fn example(store: CloudStore) {
    /// let mut watch = store.watch();
    /// while let Some(transcripts) = watch.next().await {
    ///     println!("{} saved chats", transcripts.len());
    /// }
    /// # }
    /// ```
    pub fn watch(&self) -> TranscriptWatch {
        TranscriptWatch::spawn(self.clone())
    }
}

fn decode_row(row: Row) -> ArchiveResult<Transcript> {
    Transcript::decode_with(&Value::Object(row), &ROW_FIELDS)
}

#[async_trait]
impl TranscriptArchive for CloudStore {
    async fn save(&self, transcript: &Transcript) -> ArchiveResult<()> {
        let owner = self.require_owner()?;
        let row = transcript.clone().with_owner(owner).encode_with(&ROW_FIELDS);
        self.backend.insert(&self.table, row).await?;
        tracing::debug!("Saved transcript {} to {}", transcript.id, self.table);
        Ok(())
    }

    async fn list_all(&self) -> ArchiveResult<Listing> {
        match self.owner() {
            Some(owner) => self.fetch(&Self::owned_by(&owner)).await,
            None => Ok(Listing::new()),
        }
    }

    async fn get_by_id(&self, id: &str) -> ArchiveResult<Option<Transcript>> {
        let Some(owner) = self.owner() else {
            return Ok(None);
        };
        let query = Query::new()
            .eq(ROW_FIELDS.id, id)
            .eq(ROW_FIELDS.owner_id, owner);
        let rows = self.backend.select(&self.table, &query).await?;

        Ok(rows.into_iter().next().and_then(|row| match decode_row(row) {
            Ok(transcript) => Some(transcript),
            Err(e) => {
                tracing::warn!("Stored transcript {} is unreadable: {}", id, e);
                None
            }
        }))
    }

    async fn delete_by_id(&self, id: &str) -> ArchiveResult<()> {
        let owner = self.require_owner()?;
        let deleted = self
            .backend
            .delete(&self.table, &Self::scoped(id, &owner))
            .await?;
        tracing::debug!("Deleted {} row(s) for transcript {}", deleted, id);
        Ok(())
    }

    async fn delete_all(&self) -> ArchiveResult<()> {
        let owner = self.require_owner()?;
        let deleted = self
            .backend
            .delete(&self.table, &[Filter::eq(ROW_FIELDS.owner_id, owner)])
            .await?;
        tracing::debug!("Deleted {} transcripts from {}", deleted, self.table);
        Ok(())
    }

    async fn update_title(&self, id: &str, title: &str) -> ArchiveResult<()> {
        let owner = self.require_owner()?;
        let mut patch = Row::new();
        patch.insert(ROW_FIELDS.title.to_string(), Value::String(title.to_string()));
        self.backend
            .update(&self.table, &Self::scoped(id, &owner), patch)
            .await?;
        Ok(())
    }

    async fn search(&self, query: &str) -> ArchiveResult<Listing> {
        match self.owner() {
            Some(owner) => {
                self.fetch(&Self::owned_by(&owner).ilike(ROW_FIELDS.title, query.trim()))
                    .await
            }
            None => Ok(Listing::new()),
        }
    }
}
