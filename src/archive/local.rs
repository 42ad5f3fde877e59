//! On-device transcript mirror
//!
//! Stores saved transcripts in an embedded `sled` key-value database keyed
//! by transcript id, so the archive works without network access. Values
//! are the JSON encoding of [`Transcript::encode`]. Owner scoping is done by
//! filtering decoded records.
//!
//! The store must be [`initialize`](LocalMirrorStore::initialize)d before
//! use; every other operation fails fast with
//! [`MedibotError::NotInitialized`] until then.

use super::listing::Listing;
use super::transcript::{Transcript, RECORD_FIELDS};
use super::TranscriptArchive;
use crate::auth::AuthProvider;
use crate::error::{ArchiveResult, MedibotError};
use async_trait::async_trait;
use serde_json::Value;
use sled::Db;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Key-value transcript store on the local device
///
/// # Examples
///
/// ```no_run
/// use medibot::archive::LocalMirrorStore;
///
/// # fn main() -> Result<(), medibot::error::MedibotError> {
/// let store = LocalMirrorStore::new("/tmp/medibot-chats");
/// store.initialize()?;
/// let listing = store.list_all(Some("user-1"))?;
/// println!("{} saved chats", listing.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LocalMirrorStore {
    path: PathBuf,
    db: OnceLock<Db>,
}

impl LocalMirrorStore {
    /// Create a handle for the store at `path` without opening it
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            db: OnceLock::new(),
        }
    }

    /// Directory backing the store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or reopen) the underlying database
    ///
    /// Reopening an existing directory restores everything saved by a
    /// previous process. Calling this again on an already initialized
    /// handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the database cannot be opened
    pub fn initialize(&self) -> ArchiveResult<()> {
        if self.db.get().is_some() {
            return Ok(());
        }

        let db = sled::open(&self.path).map_err(|e| {
            MedibotError::StorageUnavailable(format!(
                "Failed to open {}: {}",
                self.path.display(),
                e
            ))
        })?;
        tracing::debug!("Opened local transcript store at {}", self.path.display());

        // A concurrent initializer may have won; its handle is kept.
        let _ = self.db.set(db);
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed
    pub fn is_initialized(&self) -> bool {
        self.db.get().is_some()
    }

    fn db(&self) -> ArchiveResult<&Db> {
        self.db.get().ok_or(MedibotError::NotInitialized)
    }

    /// Insert or overwrite a transcript by id
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before setup and `StoreWrite` if the
    /// insert or flush fails
    pub fn save(&self, transcript: &Transcript) -> ArchiveResult<()> {
        let db = self.db()?;
        let value = serde_json::to_vec(&transcript.encode())?;

        db.insert(transcript.id.as_bytes(), value)
            .map_err(|e| MedibotError::StoreWrite(format!("Insert failed: {}", e)))?;
        db.flush()
            .map_err(|e| MedibotError::StoreWrite(format!("Flush failed: {}", e)))?;

        tracing::debug!("Saved transcript {} locally", transcript.id);
        Ok(())
    }

    /// List transcripts, newest first
    ///
    /// # Arguments
    ///
    /// * `owner_id` - When set, only transcripts owned by this principal
    ///
    /// # Returns
    ///
    /// The decoded transcripts plus a record of every entry that failed to
    /// decode. Corrupt entries are skipped, never fatal. With an owner, a
    /// corrupt entry is only reported if its raw `ownerId` names that owner.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before setup and `StoreRead` if iteration
    /// fails
    pub fn list_all(&self, owner_id: Option<&str>) -> ArchiveResult<Listing> {
        Ok(self.scan(owner_id)?.newest_first())
    }

    /// Fetch one transcript
    ///
    /// Returns `None` if the id is absent or the stored record is
    /// unreadable.
    pub fn get_by_id(&self, id: &str) -> ArchiveResult<Option<Transcript>> {
        let db = self.db()?;
        let raw = db
            .get(id.as_bytes())
            .map_err(|e| MedibotError::StoreRead(format!("Get failed: {}", e)))?;

        Ok(raw.and_then(|bytes| match decode_value(&bytes) {
            Ok(transcript) => Some(transcript),
            Err(e) => {
                tracing::warn!("Stored transcript {} is unreadable: {}", id, e);
                None
            }
        }))
    }

    /// Remove a transcript; absent ids are ignored
    pub fn delete_by_id(&self, id: &str) -> ArchiveResult<()> {
        let db = self.db()?;
        db.remove(id.as_bytes())
            .map_err(|e| MedibotError::StoreWrite(format!("Remove failed: {}", e)))?;
        db.flush()
            .map_err(|e| MedibotError::StoreWrite(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    /// Delete every transcript, or only those of one owner
    ///
    /// Owner-scoped deletion is applied as a single batch, so either all of
    /// the owner's transcripts are removed or none are. Records that cannot
    /// be decoded have no known owner and are left in place.
    ///
    /// # Returns
    ///
    /// The number of records removed
    pub fn delete_all(&self, owner_id: Option<&str>) -> ArchiveResult<usize> {
        let db = self.db()?;

        let removed = match owner_id {
            None => {
                let count = db.len();
                db.clear()
                    .map_err(|e| MedibotError::StoreWrite(format!("Clear failed: {}", e)))?;
                count
            }
            Some(owner) => {
                let owned = self.list_all(Some(owner))?;
                let mut batch = sled::Batch::default();
                for transcript in &owned.transcripts {
                    batch.remove(transcript.id.as_bytes());
                }
                db.apply_batch(batch)
                    .map_err(|e| MedibotError::StoreWrite(format!("Batch delete failed: {}", e)))?;
                owned.len()
            }
        };

        db.flush()
            .map_err(|e| MedibotError::StoreWrite(format!("Flush failed: {}", e)))?;
        tracing::debug!("Deleted {} local transcripts", removed);
        Ok(removed)
    }

    /// Number of readable transcripts, optionally for one owner
    pub fn count(&self, owner_id: Option<&str>) -> ArchiveResult<usize> {
        Ok(self.list_all(owner_id)?.len())
    }

    /// Rename a transcript in place
    ///
    /// # Returns
    ///
    /// `true` if a readable transcript with that id existed
    pub fn update_title(&self, id: &str, title: &str) -> ArchiveResult<bool> {
        match self.get_by_id(id)? {
            Some(mut transcript) => {
                transcript.title = title.to_string();
                self.save(&transcript)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Case-insensitive title search, newest first
    pub fn search(&self, query: &str, owner_id: Option<&str>) -> ArchiveResult<Listing> {
        Ok(self.list_all(owner_id)?.retain(|t| t.title_matches(query)))
    }

    /// Decode stored records in key order
    ///
    /// With an owner, records are matched on their raw `ownerId` before
    /// decoding; records whose owner cannot be read are left out.
    fn scan(&self, owner_id: Option<&str>) -> ArchiveResult<Listing> {
        let db = self.db()?;
        let mut listing = Listing::new();

        for entry in db.iter() {
            let (key, value) =
                entry.map_err(|e| MedibotError::StoreRead(format!("Iteration failed: {}", e)))?;
            let raw = parse_value(&value);
            if let Some(owner) = owner_id {
                let stored_owner = raw
                    .as_ref()
                    .ok()
                    .and_then(|v| v.get(RECORD_FIELDS.owner_id))
                    .and_then(Value::as_str);
                if stored_owner != Some(owner) {
                    continue;
                }
            }
            listing.push(
                String::from_utf8_lossy(&key),
                raw.and_then(|v| Transcript::decode(&v)),
            );
        }

        Ok(listing)
    }

    /// Write raw bytes under a key, bypassing encoding
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: &str, value: &[u8]) -> ArchiveResult<()> {
        self.db()?
            .insert(key.as_bytes(), value)
            .map_err(|e| MedibotError::StoreWrite(e.to_string()))?;
        Ok(())
    }
}

fn parse_value(bytes: &[u8]) -> ArchiveResult<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| MedibotError::malformed(format!("invalid JSON: {}", e)))
}

fn decode_value(bytes: &[u8]) -> ArchiveResult<Transcript> {
    Transcript::decode(&parse_value(bytes)?)
}

/// The local mirror bound to the signed-in principal
///
/// Presents [`LocalMirrorStore`] through the [`TranscriptArchive`]
/// interface: reads are filtered to the current principal (empty when
/// anonymous) and saves are stamped with the principal's id.
pub struct LocalArchive {
    store: Arc<LocalMirrorStore>,
    auth: Arc<dyn AuthProvider>,
}

impl LocalArchive {
    pub fn new(store: Arc<LocalMirrorStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    fn owner(&self) -> Option<String> {
        self.auth.current_principal().map(|p| p.id)
    }

    fn owned(&self, id: &str, owner: &str) -> ArchiveResult<Option<Transcript>> {
        Ok(self
            .store
            .get_by_id(id)?
            .filter(|t| t.owner_id == owner))
    }
}

#[async_trait]
impl TranscriptArchive for LocalArchive {
    async fn save(&self, transcript: &Transcript) -> ArchiveResult<()> {
        let owner = self.owner().ok_or(MedibotError::NotAuthenticated)?;
        self.store.save(&transcript.clone().with_owner(owner))
    }

    async fn list_all(&self) -> ArchiveResult<Listing> {
        match self.owner() {
            Some(owner) => self.store.list_all(Some(&owner)),
            None => Ok(Listing::new()),
        }
    }

    async fn get_by_id(&self, id: &str) -> ArchiveResult<Option<Transcript>> {
        match self.owner() {
            Some(owner) => self.owned(id, &owner),
            None => Ok(None),
        }
    }

    async fn delete_by_id(&self, id: &str) -> ArchiveResult<()> {
        let owner = self.owner().ok_or(MedibotError::NotAuthenticated)?;
        if self.owned(id, &owner)?.is_some() {
            self.store.delete_by_id(id)?;
        }
        Ok(())
    }

    async fn delete_all(&self) -> ArchiveResult<()> {
        let owner = self.owner().ok_or(MedibotError::NotAuthenticated)?;
        self.store.delete_all(Some(&owner))?;
        Ok(())
    }

    async fn update_title(&self, id: &str, title: &str) -> ArchiveResult<()> {
        let owner = self.owner().ok_or(MedibotError::NotAuthenticated)?;
        if self.owned(id, &owner)?.is_some() {
            self.store.update_title(id, title)?;
        }
        Ok(())
    }

    async fn search(&self, query: &str) -> ArchiveResult<Listing> {
        match self.owner() {
            Some(owner) => self.store.search(query, Some(&owner)),
            None => Ok(Listing::new()),
        }
    }
}
