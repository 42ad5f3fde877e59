//! Medibot - medical assistant chat client
//!
#![doc = "Main entry point for the Medibot command-line client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use medibot::cli::{Cli, Commands};
use medibot::commands;
use medibot::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { save, title } => {
            tracing::info!("Starting interactive chat mode");
            if save {
                tracing::debug!("Conversation will be saved to the {} archive", config.archive.backend);
            }
            commands::chat::run_chat(config, save, title).await?;
            Ok(())
        }
        Commands::Assess => {
            commands::assess::run_assessment(config).await?;
            Ok(())
        }
        Commands::Archive { command } => {
            tracing::info!("Starting archive command");
            commands::archive::handle_archive(&config, command).await?;
            Ok(())
        }
        Commands::Health => {
            commands::health::check_health(&config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "medibot=debug" } else { "medibot=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
