//! Global configuration types for relaychat.
//!
//! `RelayConfig` represents the top-level `config.toml`. Every field has a
//! default, so an empty file (or no file at all) yields a working setup.
//! Environment overrides are applied by the infra config loader.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Database URL for the message store.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Broker endpoint. Only the in-process `memory://` broker is built in.
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    /// Capacity of each chat's delivery channel in the subscription registry.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Queue depth of each broker subscription before messages are dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Fetch OpenGraph metadata for messages that are a single link.
    #[serde(default = "default_true")]
    pub link_preview: bool,

    /// Timeout for link preview fetches, in milliseconds.
    #[serde(default = "default_link_preview_timeout_ms")]
    pub link_preview_timeout_ms: u64,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub saga: SagaConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

fn default_broker_url() -> String {
    "memory://".to_string()
}

fn default_channel_capacity() -> usize {
    10
}

fn default_subscriber_buffer() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_link_preview_timeout_ms() -> u64 {
    3_000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            broker_url: default_broker_url(),
            channel_capacity: default_channel_capacity(),
            subscriber_buffer: default_subscriber_buffer(),
            link_preview: default_true(),
            link_preview_timeout_ms: default_link_preview_timeout_ms(),
            email: EmailConfig::default(),
            saga: SagaConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

/// Outbound email settings.
///
/// Without an `endpoint` emails are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// HTTP endpoint of the email relay.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Address used in the `From` field.
    #[serde(default = "default_from")]
    pub from: String,
}

fn default_from() -> String {
    "noreply@relaychat.local".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            from: default_from(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaConfig {
    /// Per-recipient notification re-attempts. 0 means the first failure
    /// compensates immediately.
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Number of recent message ids remembered to suppress redelivered
    /// messages. 0 disables de-duplication.
    #[serde(default)]
    pub dedupe_window: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.broker_url, "memory://");
        assert_eq!(config.channel_capacity, 10);
        assert_eq!(config.subscriber_buffer, 256);
        assert!(config.link_preview);
        assert!(config.email.endpoint.is_none());
        assert_eq!(config.saga.max_retries, 0);
        assert_eq!(config.notifier.dedupe_window, 0);
    }

    #[test]
    fn test_relay_config_deserialize_with_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.channel_capacity, 10);
        assert_eq!(config.email.from, "noreply@relaychat.local");
    }

    #[test]
    fn test_relay_config_deserialize_with_values() {
        let toml_str = r#"
channel_capacity = 32
link_preview = false

[email]
endpoint = "https://mail.example.com/send"
from = "chat@example.com"

[saga]
max_retries = 2

[notifier]
dedupe_window = 128
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.channel_capacity, 32);
        assert!(!config.link_preview);
        assert_eq!(
            config.email.endpoint.as_deref(),
            Some("https://mail.example.com/send")
        );
        assert_eq!(config.email.from, "chat@example.com");
        assert_eq!(config.saga.max_retries, 2);
        assert_eq!(config.notifier.dedupe_window, 128);
    }
}
