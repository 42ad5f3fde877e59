//! Error types for Medibot
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Medibot operations
///
/// This enum covers archive storage failures (local mirror and cloud
/// table), authentication state, record decoding, configuration, and the
/// remote chat API.
#[derive(Error, Debug)]
pub enum MedibotError {
    /// The local store was used before `initialize()` completed
    #[error("Local store used before initialization")]
    NotInitialized,

    /// The embedded key-value engine could not be opened
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A principal-scoped operation was attempted while signed out
    #[error("Not authenticated: sign in to access saved chats")]
    NotAuthenticated,

    /// A stored record did not match the transcript schema
    #[error("Malformed record: {reason}")]
    MalformedRecord {
        /// What was wrong with the record
        reason: String,
    },

    /// A backend write (insert, update, delete) failed
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// A backend read failed
    #[error("Store read failed: {0}")]
    StoreRead(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input rejected before it was sent
    #[error("Invalid message: {0}")]
    Validation(String),

    /// Input mentions symptoms that need emergency care
    #[error("Emergency symptom detected: {keyword}")]
    Emergency {
        /// The keyword that triggered the check
        keyword: String,
    },

    /// The chat API rejected the request with HTTP 429
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    /// The chat API returned a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message reported by the server
        message: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MedibotError {
    /// Build a `MalformedRecord` error from anything printable
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }
}

/// Result type alias for Medibot application code
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Result type for the archive layer
///
/// Keeps the concrete [`MedibotError`] so callers can react to the kind
/// (for example showing a sign-in prompt on `NotAuthenticated`).
pub type ArchiveResult<T> = std::result::Result<T, MedibotError>;

/// Result type for the chat API client
pub type ClientResult<T> = std::result::Result<T, MedibotError>;
