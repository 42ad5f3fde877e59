use super::{confirm, session_auth, truncate};
use crate::archive::{
    open_archive, open_cloud_store, ArchiveBrowser, Listing, Transcript, TranscriptArchive,
};
use crate::cli::ArchiveCommand;
use crate::config::{ArchiveBackend, Config};
use crate::error::{MedibotError, Result};
use colored::Colorize;
use futures::StreamExt;
use prettytable::{format, Table};

/// Handle saved-chat commands
pub async fn handle_archive(config: &Config, command: ArchiveCommand) -> Result<()> {
    let auth = session_auth(config);

    if let ArchiveCommand::Watch = command {
        if config.archive.backend != ArchiveBackend::Cloud {
            return Err(MedibotError::Config(
                "archive watch requires the cloud archive backend".to_string(),
            )
            .into());
        }
        return watch(config, open_cloud_store(config, auth)?).await;
    }

    let archive = open_archive(config, auth.clone())?;

    match command {
        ArchiveCommand::List { search } => {
            let listing = match search.as_deref() {
                Some(query) => archive.search(query).await?,
                None => archive.list_all().await?,
            };
            print_listing(&listing);
        }
        ArchiveCommand::Show { id } => match archive.get_by_id(&id).await? {
            Some(transcript) => print_transcript(&transcript),
            None => println!("{}", format!("No saved chat with ID {}", id).yellow()),
        },
        ArchiveCommand::Delete { id, yes } => {
            let mut browser = ArchiveBrowser::new(archive, auth);
            browser.activate().await?;

            let Some(request) = browser.request_delete(&id) else {
                println!("{}", format!("No saved chat with ID {}", id).yellow());
                return Ok(());
            };
            if !yes && !confirm(&format!("Delete \"{}\"?", request.title()))? {
                println!("Cancelled.");
                return Ok(());
            }
            browser.confirm_delete(request).await?;
            println!("{}", format!("Deleted saved chat {}", id).green());
        }
        ArchiveCommand::Rename { id, title } => {
            if archive.get_by_id(&id).await?.is_none() {
                println!("{}", format!("No saved chat with ID {}", id).yellow());
                return Ok(());
            }
            archive.update_title(&id, title.trim()).await?;
            println!("{}", format!("Renamed saved chat {}", id).green());
        }
        ArchiveCommand::Clear { yes } => {
            let count = archive.count().await?;
            if count == 0 {
                println!("{}", "No saved chats found.".yellow());
                return Ok(());
            }
            if !yes && !confirm(&format!("Delete all {} saved chats?", count))? {
                println!("Cancelled.");
                return Ok(());
            }
            archive.delete_all().await?;
            println!("{}", format!("Deleted {} saved chats", count).green());
        }
        ArchiveCommand::Count => {
            println!("{}", archive.count().await?);
        }
        ArchiveCommand::Watch => {}
    }

    Ok(())
}

async fn watch(config: &Config, store: crate::archive::CloudStore) -> Result<()> {
    let mut stream = store.watch();
    println!(
        "Watching {} for changes. Press Ctrl-C to stop.",
        config.archive.table.cyan()
    );

    loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(transcripts) => {
                    println!();
                    print_transcripts(&transcripts);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                stream.cancel();
                break;
            }
        }
    }

    Ok(())
}

fn print_listing(listing: &Listing) {
    print_transcripts(&listing.transcripts);
    if !listing.failures.is_empty() {
        println!(
            "{}",
            format!(
                "{} saved chat(s) could not be read and were skipped.",
                listing.failures.len()
            )
            .yellow()
        );
    }
}

fn print_transcripts(transcripts: &[Transcript]) {
    if transcripts.is_empty() {
        println!("{}", "No saved chats found.".yellow());
        return;
    }

    println!("\nSaved Chats:");
    transcript_table(transcripts).printstd();
    println!();
    println!("Use {} to read one.", "medibot archive show <ID>".cyan());
    println!();
}

fn transcript_table(transcripts: &[Transcript]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Saved".bold()
    ]);

    for transcript in transcripts {
        let saved = transcript
            .saved_at()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        table.add_row(prettytable::row![
            transcript.id.cyan(),
            truncate(&transcript.title, 40),
            transcript.message_count(),
            saved
        ]);
    }

    table
}

fn print_transcript(transcript: &Transcript) {
    println!("\n{}", transcript.title.bold());
    println!(
        "{}",
        format!(
            "{} messages, saved {}",
            transcript.message_count(),
            transcript
                .saved_at()
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
        )
        .dimmed()
    );
    println!();

    for message in transcript.messages() {
        let speaker = if message.is_user {
            "You".cyan().bold()
        } else {
            "Medibot".green().bold()
        };
        println!("{} {}", speaker, message.timestamp.format("%H:%M").to_string().dimmed());
        println!("{}\n", message.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Message;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_transcript_table_has_header_and_rows() {
        let transcripts = vec![
            Transcript::new(
                "01A",
                "u1",
                "Flu symptoms",
                vec![Message::user("hi"), Message::assistant("hello")],
                Utc.timestamp_opt(100, 0).unwrap(),
            ),
            Transcript::new(
                "01B",
                "u1",
                "A very long title that goes well beyond the forty character column",
                vec![Message::user("hi")],
                Utc.timestamp_opt(200, 0).unwrap(),
            ),
        ];

        let table = transcript_table(&transcripts);
        assert_eq!(table.len(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("Flu symptoms"));
        assert!(rendered.contains("..."));
    }
}
