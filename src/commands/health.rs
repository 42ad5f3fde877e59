use crate::client::MedibotClient;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;

/// Print the chat API's health status
///
/// # Errors
///
/// Returns an error if the API cannot be reached or reports a failure
pub async fn check_health(config: &Config) -> Result<()> {
    let client = MedibotClient::new(&config.api)?;
    let health = client.health().await?;

    let status = if health.is_healthy() {
        health.status.green()
    } else {
        health.status.yellow()
    };
    println!("API:      {}", client.base_url().cyan());
    println!("Status:   {}", status);
    if let Some(version) = &health.version {
        println!("Version:  {}", version);
    }
    if !health.services.is_empty() {
        println!("Services: {}", health.services.join(", "));
    }

    Ok(())
}
