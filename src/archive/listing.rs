//! Listing results that keep going past corrupt records
//!
//! Listing a store folds every raw record into a [`Listing`]: decoded
//! transcripts on one side, decode failures on the other. One bad record
//! never fails the whole listing.

use super::transcript::Transcript;
use crate::error::MedibotError;
use std::cmp::Reverse;

/// A record that could not be decoded during a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Storage key or row id of the record
    pub key: String,
    /// Why decoding failed
    pub reason: String,
}

/// Transcripts produced by a list operation plus any skipped records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub transcripts: Vec<Transcript>,
    pub failures: Vec<DecodeFailure>,
}

impl Listing {
    /// Create an empty listing
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decode result into the listing
    ///
    /// Failures are logged at `warn` and recorded; successes are kept in
    /// arrival order.
    pub fn push(&mut self, key: impl Into<String>, decoded: Result<Transcript, MedibotError>) {
        match decoded {
            Ok(transcript) => self.transcripts.push(transcript),
            Err(e) => {
                let key = key.into();
                tracing::warn!("Skipping unreadable transcript {}: {}", key, e);
                self.failures.push(DecodeFailure {
                    key,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Keep only transcripts satisfying the predicate
    pub fn retain(mut self, f: impl FnMut(&Transcript) -> bool) -> Self {
        self.transcripts.retain(f);
        self
    }

    /// Order newest first
    ///
    /// The sort is stable, so transcripts saved at the same instant keep
    /// the order they were read in.
    pub fn newest_first(mut self) -> Self {
        self.transcripts.sort_by_key(|t| Reverse(t.saved_at()));
        self
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    /// Discard the failure side-channel
    pub fn into_transcripts(self) -> Vec<Transcript> {
        self.transcripts
    }
}
