//! Special commands parser for interactive chat
//!
//! Commands are prefixed with `/` and are case-insensitive. Anything else
//! is sent to the assistant as a chat message.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),
}

/// Commands handled by the chat loop instead of the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Show available commands
    Help,

    /// Forget the conversation here and on the server
    Clear,

    /// Save the conversation so far, optionally with a title
    Save(Option<String>),

    /// Leave the chat
    Exit,

    /// Not a command; send the input as a message
    None,
}

/// Parse one line of chat input
///
/// # Examples
///
/// ```
/// use medibot::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/help").unwrap(), SpecialCommand::Help);
/// assert_eq!(
///     parse_special_command("/save Knee pain").unwrap(),
///     SpecialCommand::Save(Some("Knee pain".to_string()))
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    match lower.as_str() {
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/clear" | "/new" => Ok(SpecialCommand::Clear),
        "/save" => Ok(SpecialCommand::Save(None)),
        // Keep the title's original casing.
        input if input.starts_with("/save ") => {
            let title = trimmed[6..].trim();
            Ok(SpecialCommand::Save(
                (!title.is_empty()).then(|| title.to_string()),
            ))
        }
        "/exit" | "/quit" | "exit" | "quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print the chat help text
pub fn print_help() {
    use colored::Colorize;

    println!("\n{}", "Chat commands".bold());
    println!("  {}            Show this help", "/help".cyan());
    println!("  {}           Start over with an empty conversation", "/clear".cyan());
    println!("  {}   Save the conversation to your archive", "/save [title]".cyan());
    println!("  {}            Leave the chat", "/exit".cyan());
    println!();
    println!("Anything else is sent to the assistant.");
    println!(
        "{}",
        "Medibot provides general information only. In an emergency call your local emergency number."
            .yellow()
    );
    println!();
}
