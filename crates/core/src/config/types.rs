use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// TMDB API secret.
    pub themoviedb_key: String,
    /// Path to the catalog database file.
    pub db_name: PathBuf,
    pub bot_config: BotConfig,
    #[serde(default)]
    pub harvester: HarvesterConfig,
}

/// Telegram-facing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// Bot token; doubles as the secret webhook path.
    pub telegram_token: String,
    /// Publicly reachable host for the webhook.
    pub webhook_address: String,
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,
    /// Upstream Bot API host.
    #[serde(default = "default_bot_api_address")]
    pub telegram_bot_api_address: String,
    /// PEM certificate presented by the webhook listener and uploaded to
    /// the Bot API on registration.
    pub public_cert: PathBuf,
    pub private_key: PathBuf,
}

/// Harvester tuning knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarvesterConfig {
    /// Number of concurrent crawler workers.
    #[serde(default = "default_crawlers")]
    pub crawlers: usize,
    /// Vote-count floor below which posters are not worth fetching.
    #[serde(default = "default_min_vote_count")]
    pub min_vote_count: u32,
    /// Lower floor for Russian-original movies, which gather far fewer
    /// votes upstream.
    #[serde(default = "default_min_vote_count_ru")]
    pub min_vote_count_ru: u32,
    /// Languages for which titles and posters are stored.
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<String>,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            crawlers: default_crawlers(),
            min_vote_count: default_min_vote_count(),
            min_vote_count_ru: default_min_vote_count_ru(),
            supported_languages: default_supported_languages(),
        }
    }
}

fn default_webhook_port() -> u16 {
    8443
}

fn default_bot_api_address() -> String {
    "https://api.telegram.org".to_string()
}

fn default_crawlers() -> usize {
    3
}

fn default_min_vote_count() -> u32 {
    25
}

fn default_min_vote_count_ru() -> u32 {
    5
}

fn default_supported_languages() -> Vec<String> {
    vec!["en".to_string(), "ru".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvester_defaults() {
        let config = HarvesterConfig::default();
        assert_eq!(config.crawlers, 3);
        assert_eq!(config.min_vote_count, 25);
        assert_eq!(config.min_vote_count_ru, 5);
        assert_eq!(config.supported_languages, vec!["en", "ru"]);
    }
}
