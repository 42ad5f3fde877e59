/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`    : Interactive chat with the assistant
- `assess`  : Guided symptom checker
- `archive` : Saved-chat management
- `health`  : API reachability check

The handlers are thin: they wire configuration into the client and archive
types from the library and render results for the terminal.
*/

use crate::auth::SessionAuth;
use crate::config::Config;
use crate::error::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

pub mod archive;
pub mod assess;
pub mod chat;
pub mod health;
pub mod special_commands;

/// Session for the principal named in configuration
pub(crate) fn session_auth(config: &Config) -> Arc<SessionAuth> {
    let auth = SessionAuth::from_config(&config.auth);
    if config.auth.user_id.is_none() {
        tracing::debug!("No user configured; archive access is anonymous");
    }
    Arc::new(auth)
}

/// Ask a yes/no question on the terminal; anything but `y`/`yes` is no
pub(crate) fn confirm(question: &str) -> Result<bool> {
    let mut rl = DefaultEditor::new()?;
    match rl.readline(&format!("{} [y/N] ", question)) {
        Ok(line) => Ok(is_yes(&line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Shorten `text` to `max` characters, marking the cut with `...`
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 10), "abcdefg...");
        assert_eq!(truncate("ééééééééééé", 10).chars().count(), 10);
    }
}
