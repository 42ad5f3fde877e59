//! Medibot - medical assistant chat client library
//!
//! This library provides the core functionality for Medibot: the saved-chat
//! archive, the chat API client, input screening, configuration, and the
//! command handlers behind the `medibot` binary.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `archive`: Transcript model, local and cloud stores, live watch, browser
//! - `auth`: Current-principal state consumed by the archive
//! - `chat`: Message validation, emergency screening, in-progress sessions
//! - `client`: HTTP client for the chat and symptom-checker API
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use medibot::archive::{open_archive, TranscriptArchive};
//! use medibot::auth::SessionAuth;
//! use medibot::Config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let auth = Arc::new(SessionAuth::from_config(&config.auth));
//!     let archive = open_archive(&config, auth)?;
//!     println!("{} saved chats", archive.count().await?);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use archive::{CloudStore, LocalArchive, LocalMirrorStore, Transcript, TranscriptArchive};
pub use auth::{AuthProvider, Principal, SessionAuth};
pub use client::MedibotClient;
pub use config::Config;
pub use error::{MedibotError, Result};

#[cfg(test)]
pub mod test_utils;
