//! Searchable, deletable view over a transcript archive
//!
//! [`ArchiveBrowser`] holds the list a user is looking at. The store is
//! queried on [`activate`](ArchiveBrowser::activate) and
//! [`refresh`](ArchiveBrowser::refresh) only; typing a search query filters
//! the in-memory list without another round-trip.

use super::listing::DecodeFailure;
use super::transcript::Transcript;
use super::TranscriptArchive;
use crate::auth::AuthProvider;
use crate::error::ArchiveResult;
use std::sync::Arc;

/// What the browser is currently showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserState {
    /// Nobody is signed in; distinct from an empty archive
    SignedOut,
    /// The principal's transcripts and the active search query
    Ready {
        transcripts: Vec<Transcript>,
        query: String,
    },
}

/// A pending deletion awaiting confirmation
///
/// Only [`ArchiveBrowser::request_delete`] creates these, so nothing can be
/// deleted without first going through the confirm step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    id: String,
    title: String,
}

impl DeleteRequest {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Title to show in the confirmation prompt
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Browser over whichever archive was selected at startup
pub struct ArchiveBrowser {
    archive: Arc<dyn TranscriptArchive>,
    auth: Arc<dyn AuthProvider>,
    state: BrowserState,
    failures: Vec<DecodeFailure>,
}

impl ArchiveBrowser {
    pub fn new(archive: Arc<dyn TranscriptArchive>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            archive,
            auth,
            state: BrowserState::SignedOut,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    /// Records skipped during the last fetch
    pub fn failures(&self) -> &[DecodeFailure] {
        &self.failures
    }

    /// Resolve the principal and load their transcripts
    ///
    /// Resets any search query. With nobody signed in the browser moves to
    /// [`BrowserState::SignedOut`] without touching the store.
    pub async fn activate(&mut self) -> ArchiveResult<()> {
        self.load(String::new()).await
    }

    /// Reload the list, keeping the current search query
    pub async fn refresh(&mut self) -> ArchiveResult<()> {
        let query = match &self.state {
            BrowserState::Ready { query, .. } => query.clone(),
            BrowserState::SignedOut => String::new(),
        };
        self.load(query).await
    }

    async fn load(&mut self, query: String) -> ArchiveResult<()> {
        if self.auth.current_principal().is_none() {
            self.state = BrowserState::SignedOut;
            self.failures.clear();
            return Ok(());
        }

        let listing = self.archive.list_all().await?;
        tracing::debug!(
            "Loaded {} transcripts ({} unreadable)",
            listing.len(),
            listing.failures.len()
        );
        self.failures = listing.failures;
        self.state = BrowserState::Ready {
            transcripts: listing.transcripts,
            query,
        };
        Ok(())
    }

    /// Set the search-as-you-type query; ignored while signed out
    pub fn set_query(&mut self, q: impl Into<String>) {
        if let BrowserState::Ready { query, .. } = &mut self.state {
            *query = q.into();
        }
    }

    /// Transcripts whose title matches the current query, newest first
    pub fn visible(&self) -> Vec<&Transcript> {
        match &self.state {
            BrowserState::Ready { transcripts, query } => transcripts
                .iter()
                .filter(|t| t.title_matches(query))
                .collect(),
            BrowserState::SignedOut => Vec::new(),
        }
    }

    /// The loaded transcript with the given id
    pub fn open(&self, id: &str) -> Option<&Transcript> {
        match &self.state {
            BrowserState::Ready { transcripts, .. } => transcripts.iter().find(|t| t.id == id),
            BrowserState::SignedOut => None,
        }
    }

    /// Start deleting a loaded transcript
    ///
    /// Returns `None` if the id is not in the current list.
    pub fn request_delete(&self, id: &str) -> Option<DeleteRequest> {
        self.open(id).map(|t| DeleteRequest {
            id: t.id.clone(),
            title: t.title.clone(),
        })
    }

    /// Delete the confirmed transcript and reload the list
    ///
    /// # Errors
    ///
    /// If the store rejects the deletion the error is returned and the
    /// in-memory list is left exactly as it was.
    pub async fn confirm_delete(&mut self, request: DeleteRequest) -> ArchiveResult<()> {
        self.archive.delete_by_id(&request.id).await?;
        tracing::info!("Deleted saved chat {}", request.id);
        self.refresh().await
    }
}
