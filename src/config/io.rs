//! Configuration I/O - Loading configuration
//!
//! Layered precedence: defaults < TOML file < environment variables.

use secrecy::SecretString;
use std::path::Path;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration.
///
/// `path` wins over `PROFRAG_CONFIG` and the default location. A missing file
/// is not an error; an unreadable or unparsable one is.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(super::paths::config_path);

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific TOML file
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first so local development does not need exported variables.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Overlay values from `lookup` onto `config`. Unparsable numbers are ignored.
pub(crate) fn apply_overrides_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Google
    if let Some(key) = lookup("GOOGLE_API_KEY") {
        config.google.api_key = SecretString::from(key);
    }
    if let Some(url) = lookup("GOOGLE_BASE_URL") {
        config.google.base_url = url;
    }
    if let Some(model) = lookup("EMBEDDING_MODEL") {
        config.google.embedding_model = model;
    }
    if let Some(model) = lookup("GENERATION_MODEL") {
        config.google.generation_model = model;
    }

    // Database
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = SecretString::from(url);
    }
    if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
        config.database.max_connections = v;
    }

    // Retrieval
    if let Some(v) = lookup("RETRIEVAL_THRESHOLD").and_then(|v| v.parse().ok()) {
        config.retrieval.threshold = v;
    }
    if let Some(v) = lookup("RETRIEVAL_LIMIT").and_then(|v| v.parse().ok()) {
        config.retrieval.limit = v;
    }
    if let Some(v) = lookup("EMBEDDING_DIMENSIONS").and_then(|v| v.parse().ok()) {
        config.retrieval.dimensions = v;
    }

    // Backfill
    if let Some(v) = lookup("BACKFILL_BATCH_SIZE").and_then(|v| v.parse().ok()) {
        config.backfill.batch_size = v;
    }
    if let Some(v) = lookup("BACKFILL_INTERVAL")
        .and_then(|v| humantime_serde::re::humantime::parse_duration(&v).ok())
    {
        config.backfill.interval = v;
    }

    // Gateway
    if let Some(bind) = lookup("GATEWAY_BIND") {
        config.gateway.bind = bind;
    }
    if let Some(v) = lookup("GATEWAY_PORT").and_then(|v| v.parse().ok()) {
        config.gateway.port = v;
    }

    // Logging
    if let Some(v) = lookup("LOG_FORMAT").and_then(|v| v.parse().ok()) {
        config.log.format = v;
    }
}
