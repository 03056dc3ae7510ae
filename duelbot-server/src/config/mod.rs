//! Configuration module for duelbot-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{DuelSection, FileConfig};
use duelbot_core::config::DuelConfig;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Relay connection settings. Fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub secret: Box<[u8]>,
    pub outbound_url: url::Url,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub relay: RelaySettings,
    pub duel: DuelConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        parse(&config_content, self.listen_override)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn parse(content: &str, listen_override: Option<SocketAddr>) -> Result<LoadedConfig, ConfigError> {
    let mut file_config: FileConfig = toml::from_str(content)?;

    if let Some(listen) = listen_override {
        file_config.server.listen = listen;
    }

    validate(&file_config)?;

    Ok(LoadedConfig {
        listen: file_config.server.listen,
        relay: RelaySettings {
            secret: file_config.relay.secret.into_bytes().into_boxed_slice(),
            outbound_url: file_config.relay.outbound_url,
        },
        duel: convert_duel(&file_config.duel),
    })
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.relay.secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "relay.secret must not be empty".to_string(),
        ));
    }
    let duel = &config.duel;
    for (name, value) in [
        ("open_ttl_secs", duel.open_ttl_secs),
        ("awaiting_moves_ttl_secs", duel.awaiting_moves_ttl_secs),
        ("sweep_interval_secs", duel.sweep_interval_secs),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "duel.{name} must be greater than zero"
            )));
        }
    }
    if let Some(max) = duel.max_wager.filter(|max| *max <= 0) {
        return Err(ConfigError::ValidationError(format!(
            "duel.max_wager must be positive, got {max}"
        )));
    }
    Ok(())
}

fn convert_duel(section: &DuelSection) -> DuelConfig {
    DuelConfig {
        open_ttl: time::Duration::seconds(section.open_ttl_secs as i64),
        awaiting_moves_ttl: time::Duration::seconds(section.awaiting_moves_ttl_secs as i64),
        sweep_interval: std::time::Duration::from_secs(section.sweep_interval_secs),
        max_wager: section.max_wager,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
