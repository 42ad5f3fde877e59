//! Saved-chat archive
//!
//! A transcript is persisted by one of two interchangeable stores behind
//! [`TranscriptArchive`]:
//!
//! - [`CloudStore`]: the authoritative hosted table, scoped to the signed-in
//!   principal
//! - [`LocalArchive`]: an on-device [`LocalMirrorStore`] for offline use
//!
//! The store is chosen once at startup by [`open_archive`]; the two are
//! never mixed and nothing reconciles them.

pub mod backend;
pub mod browser;
pub mod cloud;
pub mod listing;
pub mod local;
pub mod transcript;
pub mod watch;

pub use browser::{ArchiveBrowser, BrowserState, DeleteRequest};
pub use cloud::CloudStore;
pub use listing::{DecodeFailure, Listing};
pub use local::{LocalArchive, LocalMirrorStore};
pub use transcript::{Message, Transcript};
pub use watch::TranscriptWatch;

use crate::auth::AuthProvider;
use crate::config::{ArchiveBackend, Config};
use crate::error::{ArchiveResult, Result};
use async_trait::async_trait;
use backend::RestTableBackend;
use std::sync::Arc;
use std::time::Duration;

/// Persistence for saved transcripts, scoped to the current principal
///
/// Read paths return empty results when nobody is signed in; write paths
/// fail with `NotAuthenticated`. Listings skip undecodable records and
/// report them in [`Listing::failures`].
#[async_trait]
pub trait TranscriptArchive: Send + Sync {
    /// Save a new transcript, stamping it with the current principal
    async fn save(&self, transcript: &Transcript) -> ArchiveResult<()>;

    /// Every transcript of the current principal, newest first
    async fn list_all(&self) -> ArchiveResult<Listing>;

    /// A single transcript, if it exists and belongs to the principal
    async fn get_by_id(&self, id: &str) -> ArchiveResult<Option<Transcript>>;

    /// Delete one transcript; deleting an unknown id is not an error
    async fn delete_by_id(&self, id: &str) -> ArchiveResult<()>;

    /// Delete every transcript of the current principal
    ///
    /// Either all of them are removed or, on error, none are.
    async fn delete_all(&self) -> ArchiveResult<()>;

    /// Replace the title of one transcript, leaving everything else intact
    async fn update_title(&self, id: &str, title: &str) -> ArchiveResult<()>;

    /// Transcripts whose title contains `query`, case-insensitively
    async fn search(&self, query: &str) -> ArchiveResult<Listing>;

    /// Number of transcripts [`list_all`](Self::list_all) would return
    async fn count(&self) -> ArchiveResult<usize> {
        Ok(self.list_all().await?.len())
    }
}

/// Open the archive selected by `config.archive.backend`
///
/// The local store is initialized before it is returned.
///
/// # Errors
///
/// Returns an error if the local store cannot be opened or the cloud
/// backend is not configured
pub fn open_archive(config: &Config, auth: Arc<dyn AuthProvider>) -> Result<Arc<dyn TranscriptArchive>> {
    match config.archive.backend {
        ArchiveBackend::Local => {
            let path = config.archive.resolve_local_path()?;
            let store = LocalMirrorStore::new(&path);
            store.initialize()?;
            tracing::info!("Using local archive at {}", path.display());
            Ok(Arc::new(LocalArchive::new(Arc::new(store), auth)))
        }
        ArchiveBackend::Cloud => Ok(Arc::new(open_cloud_store(config, auth)?)),
    }
}

/// Build a [`CloudStore`] over the configured REST backend
pub fn open_cloud_store(config: &Config, auth: Arc<dyn AuthProvider>) -> Result<CloudStore> {
    let poll = Duration::from_secs(config.archive.watch_poll_seconds);
    let backend = RestTableBackend::new(&config.cloud, poll)?;
    tracing::info!("Using cloud archive table {}", config.archive.table);
    Ok(CloudStore::new(
        Arc::new(backend),
        auth,
        config.archive.table.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Principal, SessionAuth};
    use tempfile::TempDir;

    fn signed_in() -> Arc<dyn AuthProvider> {
        Arc::new(SessionAuth::signed_in(Principal::new("u1", None)))
    }

    #[tokio::test]
    async fn test_open_local_archive_is_initialized() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.archive.backend = ArchiveBackend::Local;
        config.archive.local_path = Some(dir.path().join("chats"));

        let archive = open_archive(&config, signed_in()).unwrap();
        assert_eq!(archive.count().await.unwrap(), 0);
    }

    #[test]
    fn test_open_cloud_requires_url() {
        let mut config = Config::default();
        config.archive.backend = ArchiveBackend::Cloud;
        config.cloud.url = None;
        assert!(open_archive(&config, signed_in()).is_err());
    }

    #[test]
    fn test_open_cloud_store() {
        let mut config = Config::default();
        config.cloud.url = Some("http://localhost:54321".to_string());
        config.cloud.api_key = Some("anon".to_string());
        let store = open_cloud_store(&config, signed_in()).unwrap();
        assert_eq!(store.table, "saved_chats");
    }
}
