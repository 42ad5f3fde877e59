//! Configuration management for Medibot
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{MedibotError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure for Medibot
///
/// Holds the chat API endpoint, the archive backend selection, cloud
/// table credentials and the signed-in principal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote chat / symptom-checker API
    #[serde(default)]
    pub api: ApiConfig,
    /// Transcript archive settings
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Hosted table backend used by the cloud archive
    #[serde(default)]
    pub cloud: CloudConfig,
    /// Principal the archive is scoped to
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Chat API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the chat API
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,

    /// Keep the server session cookie between requests
    #[serde(default = "default_persist_cookies")]
    pub persist_cookies: bool,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_timeout() -> u64 {
    60
}

fn default_persist_cookies() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_seconds: default_api_timeout(),
            persist_cookies: default_persist_cookies(),
        }
    }
}

/// Which store backs the transcript archive
///
/// Chosen once at startup; the two stores are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBackend {
    /// On-device key-value mirror
    Local,
    /// Hosted table scoped to the signed-in principal
    Cloud,
}

impl FromStr for ArchiveBackend {
    type Err = MedibotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(MedibotError::Config(format!(
                "Invalid archive backend: {}. Must be one of: local, cloud",
                other
            ))),
        }
    }
}

impl fmt::Display for ArchiveBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// Transcript archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Backend selection
    #[serde(default = "default_backend")]
    pub backend: ArchiveBackend,

    /// Directory of the local key-value store
    ///
    /// Defaults to `saved_chats` under the user's data directory.
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// Cloud table holding saved chats
    #[serde(default = "default_table")]
    pub table: String,

    /// Poll interval for the cloud change feed (seconds)
    #[serde(default = "default_watch_poll")]
    pub watch_poll_seconds: u64,
}

fn default_backend() -> ArchiveBackend {
    ArchiveBackend::Cloud
}

fn default_table() -> String {
    "saved_chats".to_string()
}

fn default_watch_poll() -> u64 {
    5
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: None,
            table: default_table(),
            watch_poll_seconds: default_watch_poll(),
        }
    }
}

impl ArchiveConfig {
    /// Resolve the local store directory
    ///
    /// # Errors
    ///
    /// Returns `Config` if no path is set and the platform data directory
    /// cannot be determined.
    pub fn resolve_local_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.local_path {
            return Ok(path.clone());
        }
        let proj_dirs = ProjectDirs::from("com", "medibot", "medibot").ok_or_else(|| {
            MedibotError::Config("Could not determine data directory".to_string())
        })?;
        Ok(proj_dirs.data_dir().join("saved_chats"))
    }
}

/// Hosted table backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// Public API key sent as `apikey`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Access token of the signed-in user, sent as a bearer token
    #[serde(default)]
    pub access_token: Option<String>,

    /// Request timeout for table calls (seconds)
    #[serde(default = "default_cloud_timeout")]
    pub timeout_seconds: u64,
}

fn default_cloud_timeout() -> u64 {
    30
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            access_token: None,
            timeout_seconds: default_cloud_timeout(),
        }
    }
}

/// Signed-in principal
///
/// Leaving `user_id` unset runs the archive anonymously.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli)?;

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MedibotError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| MedibotError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("MEDIBOT_API_URL") {
            self.api.base_url = url;
        }

        if let Ok(timeout) = std::env::var("MEDIBOT_API_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Ignoring invalid MEDIBOT_API_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(backend) = std::env::var("MEDIBOT_ARCHIVE_BACKEND") {
            match backend.parse() {
                Ok(value) => self.archive.backend = value,
                Err(e) => tracing::warn!("Ignoring MEDIBOT_ARCHIVE_BACKEND: {}", e),
            }
        }

        if let Ok(path) = std::env::var("MEDIBOT_ARCHIVE_PATH") {
            self.archive.local_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("MEDIBOT_CLOUD_URL") {
            self.cloud.url = Some(url);
        }

        if let Ok(key) = std::env::var("MEDIBOT_CLOUD_API_KEY") {
            self.cloud.api_key = Some(key);
        }

        if let Ok(token) = std::env::var("MEDIBOT_CLOUD_TOKEN") {
            self.cloud.access_token = Some(token);
        }

        if let Ok(user_id) = std::env::var("MEDIBOT_USER_ID") {
            self.auth.user_id = Some(user_id);
        }

        if let Ok(email) = std::env::var("MEDIBOT_USER_EMAIL") {
            self.auth.email = Some(email);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) -> Result<()> {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(backend) = &cli.backend {
            self.archive.backend = backend.parse()?;
        }

        if let Some(path) = &cli.archive_path {
            self.archive.local_path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(MedibotError::Config("api.base_url cannot be empty".to_string()).into());
        }

        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(MedibotError::Config(format!(
                "api.base_url is not a valid URL: {}",
                self.api.base_url
            ))
            .into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(MedibotError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.archive.table.trim().is_empty() {
            return Err(
                MedibotError::Config("archive.table cannot be empty".to_string()).into(),
            );
        }

        if self.archive.watch_poll_seconds == 0 {
            return Err(MedibotError::Config(
                "archive.watch_poll_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.archive.backend == ArchiveBackend::Cloud {
            if self.cloud.timeout_seconds == 0 {
                return Err(MedibotError::Config(
                    "cloud.timeout_seconds must be greater than 0".to_string(),
                )
                .into());
            }
            match self.cloud.url.as_deref() {
                None | Some("") => {
                    return Err(MedibotError::Config(
                        "cloud.url is required when archive.backend is cloud".to_string(),
                    )
                    .into());
                }
                Some(url) if url::Url::parse(url).is_err() => {
                    return Err(MedibotError::Config(format!(
                        "cloud.url is not a valid URL: {}",
                        url
                    ))
                    .into());
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use serial_test::serial;

    fn local_config() -> Config {
        let mut config = Config::default();
        config.archive.backend = ArchiveBackend::Local;
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.api.timeout_seconds, 60);
        assert!(config.api.persist_cookies);
        assert_eq!(config.archive.backend, ArchiveBackend::Cloud);
        assert_eq!(config.archive.table, "saved_chats");
    }

    #[test]
    fn test_config_validation_success_local() {
        assert!(local_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_cloud_requires_url() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cloud.url = Some("https://example.supabase.co".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_api_url() {
        let mut config = local_config();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = local_config();
        config.api.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cloud_timeout_defaults_and_validates() {
        let config: Config = serde_yaml::from_str("cloud:\n  url: https://example.supabase.co\n").unwrap();
        assert_eq!(config.cloud.timeout_seconds, 30);
        assert!(config.validate().is_ok());

        let mut config = config;
        config.cloud.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_poll() {
        let mut config = local_config();
        config.archive.watch_poll_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_archive_backend_parse() {
        assert_eq!("local".parse::<ArchiveBackend>().unwrap(), ArchiveBackend::Local);
        assert_eq!(" Cloud ".parse::<ArchiveBackend>().unwrap(), ArchiveBackend::Cloud);
        assert!("sqlite".parse::<ArchiveBackend>().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
api:
  base_url: "https://medibot.example.com"
archive:
  backend: local
  local_path: /tmp/medibot-chats
auth:
  user_id: "user-1"
  email: "user@example.com"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.base_url, "https://medibot.example.com");
        assert_eq!(config.api.timeout_seconds, 60);
        assert_eq!(config.archive.backend, ArchiveBackend::Local);
        assert_eq!(
            config.archive.local_path,
            Some(PathBuf::from("/tmp/medibot-chats"))
        );
        assert_eq!(config.auth.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_resolve_local_path_prefers_explicit() {
        let mut config = local_config();
        config.archive.local_path = Some(PathBuf::from("/tmp/chats"));
        assert_eq!(
            config.archive.resolve_local_path().unwrap(),
            PathBuf::from("/tmp/chats")
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("MEDIBOT_ARCHIVE_BACKEND", "local");
        std::env::set_var("MEDIBOT_USER_ID", "env-user");
        std::env::set_var("MEDIBOT_API_TIMEOUT_SECONDS", "not-a-number");

        let mut config = Config::default();
        config.apply_env_vars();

        std::env::remove_var("MEDIBOT_ARCHIVE_BACKEND");
        std::env::remove_var("MEDIBOT_USER_ID");
        std::env::remove_var("MEDIBOT_API_TIMEOUT_SECONDS");

        assert_eq!(config.archive.backend, ArchiveBackend::Local);
        assert_eq!(config.auth.user_id.as_deref(), Some("env-user"));
        assert_eq!(config.api.timeout_seconds, 60);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "medibot",
            "--backend",
            "local",
            "--archive-path",
            "/tmp/override",
            "health",
        ])
        .unwrap();
        let mut config = Config::default();
        config.apply_cli_overrides(&cli).unwrap();
        assert_eq!(config.archive.backend, ArchiveBackend::Local);
        assert_eq!(
            config.archive.local_path,
            Some(PathBuf::from("/tmp/override"))
        );
    }

    #[test]
    fn test_cli_override_rejects_unknown_backend() {
        let cli = Cli::try_parse_from(["medibot", "--backend", "sqlite", "health"]).unwrap();
        let mut config = Config::default();
        assert!(config.apply_cli_overrides(&cli).is_err());
    }
}
