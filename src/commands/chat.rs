//! Interactive chat handler
//!
//! Runs a readline loop that screens each message locally, sends it to the
//! chat API, and keeps a [`ChatSession`] so the conversation can be saved
//! to the archive.

use super::session_auth;
use super::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::archive::{open_archive, Transcript, TranscriptArchive};
use crate::auth::{AuthProvider, SessionAuth};
use crate::chat::{check_emergency, ChatSession};
use crate::client::MedibotClient;
use crate::config::Config;
use crate::error::{ArchiveResult, MedibotError, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

/// Start interactive chat
///
/// # Arguments
///
/// * `config` - Global configuration (consumed)
/// * `save` - Save the conversation when the chat ends
/// * `title` - Title for the saved conversation
pub async fn run_chat(config: Config, save: bool, title: Option<String>) -> Result<()> {
    tracing::info!("Starting interactive chat");

    let client = MedibotClient::new(&config.api)?;
    let auth = session_auth(&config);
    let mut session = ChatSession::new();
    let mut rl = DefaultEditor::new()?;

    print_welcome_banner(&client);

    loop {
        match rl.readline(&format!("{} ", "you>".cyan().bold())) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                match parse_special_command(trimmed) {
                    Ok(SpecialCommand::Help) => {
                        print_help();
                        continue;
                    }
                    Ok(SpecialCommand::Clear) => {
                        if let Err(e) = client.clear().await {
                            eprintln!("{}", format!("Error: {}", e).red());
                        }
                        session.clear();
                        println!("{}", "Conversation cleared.".green());
                        continue;
                    }
                    Ok(SpecialCommand::Save(save_title)) => {
                        let save_title = save_title.or_else(|| title.clone());
                        save_session(&config, &auth, &mut session, save_title.as_deref()).await;
                        continue;
                    }
                    Ok(SpecialCommand::Exit) => break,
                    Ok(SpecialCommand::None) => {}
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                }

                if let Some(keyword) = check_emergency(trimmed) {
                    tracing::warn!("Emergency keyword in chat input: {}", keyword);
                    print_emergency_warning(keyword);
                }

                match client.chat(trimmed).await {
                    Ok(reply) => {
                        session.push_user(trimmed);
                        session.push_assistant(reply.answer.clone());
                        println!("\n{} {}\n", "medibot>".green().bold(), reply.answer);
                        if !reply.disclaimer.is_empty() {
                            println!("{}\n", reply.disclaimer.dimmed());
                        }
                    }
                    Err(MedibotError::RateLimited) => {
                        eprintln!(
                            "{}\n",
                            "Too many messages. Please wait a minute and try again.".yellow()
                        );
                    }
                    Err(e) => {
                        eprintln!("{}\n", format!("Error: {}", e).red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    if save {
        save_session(&config, &auth, &mut session, title.as_deref()).await;
    }

    println!("Goodbye!");
    Ok(())
}

/// Save the conversation so far, reporting the outcome on the terminal
async fn save_session(
    config: &Config,
    auth: &Arc<SessionAuth>,
    session: &mut ChatSession,
    title: Option<&str>,
) {
    if session.is_empty() {
        println!("{}", "Nothing to save yet.".yellow());
        return;
    }
    if let (false, Some(id)) = (session.has_unsaved_messages(), session.saved_id()) {
        println!("{}", format!("Already saved as {}", id).dimmed());
        return;
    }

    let Some(principal) = auth.current_principal() else {
        eprintln!(
            "{}",
            "Sign in (set auth.user_id or MEDIBOT_USER_ID) to save chats.".yellow()
        );
        return;
    };

    let result = match open_archive(config, auth.clone()) {
        Ok(archive) => store_session(archive.as_ref(), session, &principal.id, title)
            .await
            .map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(transcript) => println!(
            "{}",
            format!("Saved \"{}\" as {}", transcript.title, transcript.id).green()
        ),
        Err(e) => eprintln!("{}", format!("Failed to save chat: {}", e).red()),
    }
}

/// Write the session to the archive as one transcript
///
/// A session saved before is stored again under the same id, replacing
/// the earlier, shorter snapshot.
async fn store_session(
    archive: &dyn TranscriptArchive,
    session: &mut ChatSession,
    owner_id: &str,
    title: Option<&str>,
) -> ArchiveResult<Transcript> {
    let transcript = session.finish(owner_id, title);
    if let Some(previous) = session.saved_id() {
        archive.delete_by_id(previous).await?;
    }
    archive.save(&transcript).await?;
    session.mark_saved(&transcript);
    Ok(transcript)
}

fn print_emergency_warning(keyword: &str) {
    println!();
    println!(
        "{}",
        format!(
            "EMERGENCY: '{}' may require immediate medical attention.",
            keyword
        )
        .red()
        .bold()
    );
    println!(
        "{}",
        "Call your local emergency number or go to the nearest emergency room.".red()
    );
    println!();
}

fn print_welcome_banner(client: &MedibotClient) {
    println!();
    println!("{}", "Medibot".bold());
    println!("Connected to {}", client.base_url().cyan());
    println!("Ask a health question, or type {} for commands.", "/help".cyan());
    println!(
        "{}",
        "This is general information, not a diagnosis. Always consult a healthcare professional."
            .dimmed()
    );
    println!();
}
