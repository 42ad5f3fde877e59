//! Command-line interface definition for Medibot
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting, the symptom checker, and managing
//! saved chats.

use clap::{Parser, Subcommand};

/// Medibot - medical assistant chat client
///
/// Chat with the medical assistant, run the symptom checker, and browse
/// saved conversations.
#[derive(Parser, Debug, Clone)]
#[command(name = "medibot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the archive backend from config (local, cloud)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Override the local archive directory
    #[arg(long, global = true)]
    pub archive_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Medibot
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat with the assistant
    Chat {
        /// Save the conversation to the archive when the chat ends
        #[arg(short, long)]
        save: bool,

        /// Title for the saved conversation
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Run the guided symptom checker
    Assess,

    /// Manage saved chats
    Archive {
        /// Archive subcommand
        #[command(subcommand)]
        command: ArchiveCommand,
    },

    /// Check that the chat API is reachable
    Health,
}

/// Saved-chat subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ArchiveCommand {
    /// List saved chats, newest first
    List {
        /// Only show chats whose title contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show every message of a saved chat
    Show {
        /// Saved chat ID
        id: String,
    },

    /// Delete a saved chat
    Delete {
        /// Saved chat ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Change the title of a saved chat
    Rename {
        /// Saved chat ID
        id: String,

        /// New title
        title: String,
    },

    /// Delete all of your saved chats
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the number of saved chats
    Count,

    /// Print the list again whenever it changes (cloud archive only)
    Watch,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            backend: None,
            archive_path: None,
            command: Commands::Health,
        }
    }
}
