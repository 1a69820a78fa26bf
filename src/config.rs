//! Configuration loading and management for campana.
//!
//! Loads settings from `campana.toml` with environment variable overrides for
//! sensitive data.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing Gemini API key (set GEMINI_API_KEY or [api] gemini_key)")]
    MissingApiKey,
}

/// Sites to watch and the keywords that signal a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Base URLs of the pages to scan
    pub sites: Vec<String>,
    /// Anchor-text keywords that mark a link as a campaign.
    /// Matching is literal and case-sensitive.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

/// Summarisation model and output length bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Model identifier (e.g., "gemini-2.0-flash")
    #[serde(default = "default_model")]
    pub model: String,
    /// Minimum summary length in characters
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Maximum summary length in characters
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

/// Where the notification goes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Recipient address
    pub to: String,
    /// Subject line for the digest mail
    #[serde(default = "default_subject")]
    pub subject: String,
}

/// OAuth2 client for the Gmail API (loaded from config or environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OauthConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Where the token set is persisted; defaults to
    /// `~/.config/campana/token.json`
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub oauth: OauthConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_keywords() -> Vec<String> {
    ["セール", "キャンペーン", "割引", "期間限定"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_min_length() -> usize {
    60
}

fn default_max_length() -> usize {
    150
}

fn default_subject() -> String {
    "Campaign notification".to_string()
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (campana.toml in cwd or home)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_config_file();
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Override secrets from environment variables
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.api.gemini_key = Some(key);
        }
        if let Ok(id) = std::env::var("GMAIL_CLIENT_ID") {
            config.oauth.client_id = Some(id);
        }
        if let Ok(secret) = std::env::var("GMAIL_CLIENT_SECRET") {
            config.oauth.client_secret = Some(secret);
        }

        Ok(config)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> PathBuf {
        // Check current directory first
        let local_config = PathBuf::from("campana.toml");
        if local_config.exists() {
            return local_config;
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config").join("campana").join("campana.toml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Default to local path (will error on read)
        local_config
    }

    /// Get the Gemini API key
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .gemini_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Resolve where the OAuth token set is persisted
    pub fn token_path(&self) -> PathBuf {
        if let Some(path) = &self.oauth.token_path {
            return path.clone();
        }
        dirs::home_dir()
            .map(|home| home.join(".config").join("campana").join("token.json"))
            .unwrap_or_else(|| PathBuf::from("token.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scan]
            sites = ["https://shop.example.jp/"]

            [mail]
            to = "me@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.sites, vec!["https://shop.example.jp/"]);
        assert_eq!(
            config.scan.keywords,
            vec!["セール", "キャンペーン", "割引", "期間限定"]
        );
        assert_eq!(config.summary.model, "gemini-2.0-flash");
        assert_eq!(config.summary.min_length, 60);
        assert_eq!(config.summary.max_length, 150);
        assert_eq!(config.mail.subject, "Campaign notification");
        assert!(config.oauth.client_id.is_none());
    }

    #[test]
    fn explicit_values_win_over_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scan]
            sites = ["https://a.example/"]
            keywords = ["sale"]

            [summary]
            model = "gemini-2.5-pro"
            min_length = 40
            max_length = 200

            [mail]
            to = "me@example.com"
            subject = "Deals digest"
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.keywords, vec!["sale"]);
        assert_eq!(config.summary.min_length, 40);
        assert_eq!(config.summary.max_length, 200);
        assert_eq!(config.mail.subject, "Deals digest");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let config: Config = toml::from_str(
            r#"
            [scan]
            sites = ["https://a.example/"]

            [mail]
            to = "me@example.com"
            "#,
        )
        .unwrap();

        assert!(matches!(config.api_key(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn token_path_prefers_configured_override() {
        let mut config: Config = toml::from_str(
            r#"
            [scan]
            sites = ["https://a.example/"]

            [mail]
            to = "me@example.com"
            "#,
        )
        .unwrap();
        config.oauth.token_path = Some(PathBuf::from("/tmp/tok.json"));

        assert_eq!(config.token_path(), PathBuf::from("/tmp/tok.json"));
    }
}
