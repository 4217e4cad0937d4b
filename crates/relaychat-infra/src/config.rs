//! Configuration loader for relaychat.
//!
//! Reads `config.toml` from the data directory (`~/.relaychat/` by default)
//! into [`RelayConfig`], then applies `RELAYCHAT_*` environment overrides.
//! Falls back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use relaychat_types::config::RelayConfig;
use secrecy::SecretString;

use crate::sqlite::pool::database_url_for;

pub const ENV_DATA_DIR: &str = "RELAYCHAT_DATA_DIR";
pub const ENV_DATABASE_URL: &str = "RELAYCHAT_DATABASE_URL";
pub const ENV_BROKER_URL: &str = "RELAYCHAT_BROKER_URL";
pub const ENV_CHANNEL_CAPACITY: &str = "RELAYCHAT_CHANNEL_CAPACITY";
pub const ENV_SUBSCRIBER_BUFFER: &str = "RELAYCHAT_SUBSCRIBER_BUFFER";
pub const ENV_EMAIL_ENDPOINT: &str = "RELAYCHAT_EMAIL_ENDPOINT";
pub const ENV_EMAIL_TOKEN: &str = "RELAYCHAT_EMAIL_TOKEN";
pub const ENV_EMAIL_FROM: &str = "RELAYCHAT_EMAIL_FROM";
pub const ENV_SAGA_MAX_RETRIES: &str = "RELAYCHAT_SAGA_MAX_RETRIES";
pub const ENV_DEDUPE_WINDOW: &str = "RELAYCHAT_DEDUPE_WINDOW";
pub const ENV_LINK_PREVIEW: &str = "RELAYCHAT_LINK_PREVIEW";

/// Resolve the data directory.
///
/// Priority:
/// 1. `RELAYCHAT_DATA_DIR` environment variable
/// 2. `~/.relaychat`
/// 3. `.relaychat` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".relaychat"),
        None => PathBuf::from(".relaychat"),
    }
}

/// Load configuration from `{data_dir}/config.toml` plus the process
/// environment.
pub async fn load_config(data_dir: &Path) -> RelayConfig {
    let config = load_config_file(data_dir).await;
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Load `{data_dir}/config.toml` without environment overrides.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_config_file(data_dir: &Path) -> RelayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            RelayConfig::default()
        }
    }
}

/// Apply `RELAYCHAT_*` overrides read through `lookup`.
///
/// Values that fail to parse are ignored with a warning.
pub fn apply_env_overrides(
    mut config: RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> RelayConfig {
    if let Some(url) = lookup(ENV_DATABASE_URL) {
        config.database_url = Some(url);
    }
    if let Some(url) = lookup(ENV_BROKER_URL) {
        config.broker_url = url;
    }
    if let Some(capacity) = parse_env(&lookup, ENV_CHANNEL_CAPACITY) {
        config.channel_capacity = capacity;
    }
    if let Some(buffer) = parse_env(&lookup, ENV_SUBSCRIBER_BUFFER) {
        config.subscriber_buffer = buffer;
    }
    if let Some(endpoint) = lookup(ENV_EMAIL_ENDPOINT) {
        config.email.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
    }
    if let Some(from) = lookup(ENV_EMAIL_FROM) {
        config.email.from = from;
    }
    if let Some(retries) = parse_env(&lookup, ENV_SAGA_MAX_RETRIES) {
        config.saga.max_retries = retries;
    }
    if let Some(window) = parse_env(&lookup, ENV_DEDUPE_WINDOW) {
        config.notifier.dedupe_window = window;
    }
    if let Some(value) = lookup(ENV_LINK_PREVIEW) {
        match parse_switch(&value) {
            Some(enabled) => config.link_preview = enabled,
            None => tracing::warn!("Ignoring {ENV_LINK_PREVIEW}={value}: expected on/off"),
        }
    }
    config
}

/// Email relay token from `RELAYCHAT_EMAIL_TOKEN`. Never stored in the file.
pub fn email_token() -> Option<SecretString> {
    std::env::var(ENV_EMAIL_TOKEN)
        .ok()
        .filter(|t| !t.is_empty())
        .map(SecretString::from)
}

/// Database URL from config, or the default file in `data_dir`.
pub fn resolve_database_url(config: &RelayConfig, data_dir: &Path) -> String {
    config
        .database_url
        .clone()
        .unwrap_or_else(|| database_url_for(data_dir))
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {key}={raw}: not a valid number");
            None
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
