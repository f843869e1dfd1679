//! Configuration loading and validation.

mod loader;
mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::{BotConfig, Config, HarvesterConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Reject configurations that cannot possibly run.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.themoviedb_key.is_empty() {
        return Err(ConfigError::Invalid("themoviedb_key is required".to_string()));
    }
    if config.db_name.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("db_name is required".to_string()));
    }
    if config.bot_config.telegram_token.is_empty() {
        return Err(ConfigError::Invalid(
            "bot_config.telegram_token is required".to_string(),
        ));
    }
    if config.bot_config.webhook_address.is_empty() {
        return Err(ConfigError::Invalid(
            "bot_config.webhook_address is required".to_string(),
        ));
    }
    if config.bot_config.webhook_port == 0 {
        return Err(ConfigError::Invalid(
            "bot_config.webhook_port must be non-zero".to_string(),
        ));
    }
    if config.harvester.crawlers == 0 {
        return Err(ConfigError::Invalid(
            "harvester.crawlers must be at least 1".to_string(),
        ));
    }
    if config.harvester.supported_languages.is_empty() {
        return Err(ConfigError::Invalid(
            "harvester.supported_languages must not be empty".to_string(),
        ));
    }
    Ok(())
}
