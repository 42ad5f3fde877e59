//! Live transcript list for the signed-in principal

use super::backend::{Filter, TableChange};
use super::cloud::CloudStore;
use super::transcript::{Transcript, ROW_FIELDS};
use super::TranscriptArchive;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const WATCH_BUFFER: usize = 8;

/// Stream of full transcript lists, newest first
///
/// Dropping the watch (or calling [`cancel`](Self::cancel)) stops the
/// background task and releases the table subscription.
pub struct TranscriptWatch {
    rx: ReceiverStream<Vec<Transcript>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TranscriptWatch {
    pub(crate) fn spawn(store: CloudStore) -> Self {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(store, tx, cancel.clone()));
        Self {
            rx: ReceiverStream::new(rx),
            cancel,
            handle,
        }
    }

    /// Stop watching; the stream ends after any buffered list
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Stream for TranscriptWatch {
    type Item = Vec<Transcript>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl Drop for TranscriptWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Change feed for the rows owned by `owner`; none while signed out
async fn subscribe(
    store: &CloudStore,
    owner: Option<&str>,
) -> Option<broadcast::Receiver<TableChange>> {
    let owner = owner?;
    let scope = [Filter::eq(ROW_FIELDS.owner_id, owner)];
    match store.backend.subscribe(&store.table, &scope).await {
        Ok(rx) => Some(rx),
        Err(e) => {
            tracing::warn!("Change feed for {} unavailable: {}", store.table, e);
            None
        }
    }
}

async fn run(store: CloudStore, tx: mpsc::Sender<Vec<Transcript>>, cancel: CancellationToken) {
    let mut auth_rx = store.auth.subscribe();
    let mut owner = store.owner();
    let mut changes = subscribe(&store, owner.as_deref()).await;
    let mut auth_open = true;

    loop {
        match store.list_all().await {
            Ok(listing) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(listing.into_transcripts()) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to refresh watched transcripts: {}", e),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            change = next_change(&mut changes), if changes.is_some() => {
                match change {
                    Ok(change) => tracing::debug!("Table change: {:?}", change),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("Watch lagged by {} changes", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Change feed for {} closed", store.table);
                        changes = None;
                    }
                }
            }
            changed = auth_rx.changed(), if auth_open => {
                if changed.is_err() {
                    auth_open = false;
                } else if store.owner() != owner {
                    owner = store.owner();
                    changes = subscribe(&store, owner.as_deref()).await;
                }
            }
        }

        // Nothing left that could trigger another refresh.
        if changes.is_none() && !auth_open {
            cancel.cancelled().await;
            break;
        }
    }

    tracing::debug!("Transcript watch on {} stopped", store.table);
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<TableChange>>,
) -> Result<TableChange, broadcast::error::RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
