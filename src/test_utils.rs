//! Test utilities for Medibot
//!
//! This module provides common test fixtures: temporary directories,
//! transcripts with fixed timestamps, signed-in sessions, and stores wired
//! to an in-memory table backend.

use crate::archive::backend::MemoryTableBackend;
use crate::archive::{CloudStore, Message, Transcript};
use crate::auth::{Principal, SessionAuth};
use crate::error::MedibotError;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

/// Table name used by store fixtures
pub const TEST_TABLE: &str = "saved_chats";

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Instant `secs` seconds after the Unix epoch
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Unowned two-message transcript saved at `saved_at` seconds
pub fn transcript(id: &str, title: &str, saved_at: i64) -> Transcript {
    Transcript::new(
        id,
        "",
        title,
        vec![
            Message {
                text: "hi".to_string(),
                is_user: true,
                timestamp: at(saved_at - 1),
            },
            Message {
                text: "hello".to_string(),
                is_user: false,
                timestamp: at(saved_at),
            },
        ],
        at(saved_at),
    )
}

/// Session with `id` signed in, or anonymous for `None`
pub fn session(id: Option<&str>) -> Arc<SessionAuth> {
    Arc::new(match id {
        Some(id) => SessionAuth::signed_in(Principal::new(id, None)),
        None => SessionAuth::anonymous(),
    })
}

/// Cloud store over a fresh in-memory backend
///
/// # Returns
///
/// Returns the store together with its backend and session so tests can
/// seed rows, take the backend offline, or switch principals
pub fn memory_cloud_store(
    user: Option<&str>,
) -> (CloudStore, Arc<MemoryTableBackend>, Arc<SessionAuth>) {
    let backend = Arc::new(MemoryTableBackend::new());
    let auth = session(user);
    let store = CloudStore::new(backend.clone(), auth.clone(), TEST_TABLE);
    (store, backend, auth)
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T, MedibotError>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}', got Ok", expected),
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{}', got '{}'",
                expected,
                msg
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_fixture_is_ordered() {
        let t = transcript("a", "Flu", 100);
        assert_eq!(t.message_count(), 2);
        assert!(t.messages()[0].timestamp < t.saved_at());
    }

    #[test]
    fn test_assert_error_contains() {
        let result: Result<(), MedibotError> = Err(MedibotError::NotAuthenticated);
        assert_error_contains(result, "Not authenticated");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_panics_on_ok() {
        assert_error_contains(Ok::<(), MedibotError>(()), "anything");
    }
}
