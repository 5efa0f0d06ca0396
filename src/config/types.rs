//! Configuration types
//!
//! Every section deserializes with defaults so a partial TOML file (or none at
//! all) is valid; credentials are filled from the environment afterwards.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Google AI (embedding + generation) settings
    #[serde(default)]
    pub google: GoogleConfig,
    /// PostgreSQL database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Generation settings
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Embedding backfill loop
    #[serde(default)]
    pub backfill: BackfillConfig,
    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Fail fast if a credential needed to reach any external service is absent.
    ///
    /// Runs before any network call so a misconfigured deployment never gets as
    /// far as the first request.
    pub fn require(&self) -> Result<()> {
        if self.google.api_key.expose_secret().is_empty() {
            return Err(Error::ConfigurationMissing(
                "GOOGLE_API_KEY is required".to_string(),
            ));
        }
        if self.database.url.expose_secret().is_empty() {
            return Err(Error::ConfigurationMissing(
                "DATABASE_URL is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Google Generative Language API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// API key
    #[serde(default = "empty_secret")]
    pub api_key: SecretString,
    /// Base URL for the API
    #[serde(default = "default_google_base_url")]
    pub base_url: String,
    /// Embedding model id
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Generation model id
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Upper bound on time spent retrying rate-limited embedding calls
    #[serde(default = "default_max_retry_secs")]
    pub max_retry_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        GoogleConfig {
            api_key: empty_secret(),
            base_url: default_google_base_url(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
            timeout_secs: default_timeout(),
            max_retry_secs: default_max_retry_secs(),
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_google_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_embedding_model() -> String {
    "embedding-001".to_string()
}

fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_max_retry_secs() -> u64 {
    30
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    #[serde(default = "empty_secret")]
    pub url: SecretString,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: empty_secret(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

/// Retrieval tuning
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Minimum similarity a review must reach to count as a match
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Maximum number of matches handed to the prompt
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Embedding dimensionality (D); must match the model and the column type
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Per-review character cap inside the context block
    #[serde(default = "default_max_review_chars")]
    pub max_review_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            threshold: default_threshold(),
            limit: default_limit(),
            dimensions: default_dimensions(),
            max_review_chars: default_max_review_chars(),
        }
    }
}

fn default_threshold() -> f32 {
    0.78
}

fn default_limit() -> usize {
    5
}

fn default_dimensions() -> usize {
    768
}

fn default_max_review_chars() -> usize {
    1000
}

/// Generation settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationConfig {
    /// Handlebars template overriding the built-in system instructions
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Cap on generated tokens
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

/// Embedding backfill configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillConfig {
    /// Reviews fetched per page
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between pages
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        BackfillConfig {
            batch_size: default_batch_size(),
            interval: default_interval(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

/// HTTP gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(Error::Config(format!(
                "Invalid log format: {}. Valid options: pretty, json",
                s
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info,profrag=debug,sqlx=warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retrieval.threshold, 0.78);
        assert_eq!(config.retrieval.limit, 5);
        assert_eq!(config.retrieval.dimensions, 768);
        assert_eq!(config.backfill.batch_size, 5);
        assert_eq!(config.backfill.interval, Duration::from_secs(1));
        assert_eq!(config.google.embedding_model, "embedding-001");
    }

    #[test]
    fn test_require_reports_missing_key() {
        let config = Config::default();
        let err = config.require().unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(ref m) if m.contains("GOOGLE_API_KEY")));
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
