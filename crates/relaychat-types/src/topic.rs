//! Broker topic names.
//!
//! Every chat has exactly one topic, `chat.<id>`. Subscriptions use
//! NATS-style subject patterns: tokens are separated by `.`, `*` matches
//! exactly one token and `>` matches one or more trailing tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix shared by every chat topic.
pub const CHAT_TOPIC_PREFIX: &str = "chat";

/// Pattern matching the topic of every chat.
pub const ALL_CHATS_PATTERN: &str = "chat.*";

/// A concrete (wildcard-free) broker topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// The topic carrying every message of `chat_id`.
    pub fn for_chat(chat_id: i64) -> Self {
        Topic(format!("{CHAT_TOPIC_PREFIX}.{chat_id}"))
    }

    /// Parse an arbitrary topic name. Rejects empty tokens and wildcards.
    pub fn parse(name: &str) -> Result<Self, String> {
        if name.is_empty() {
            return Err("topic must not be empty".to_string());
        }
        for token in name.split('.') {
            if token.is_empty() {
                return Err(format!("topic '{name}' contains an empty token"));
            }
            if token == "*" || token == ">" {
                return Err(format!("topic '{name}' must not contain wildcards"));
            }
        }
        Ok(Topic(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The chat id encoded in a `chat.<id>` topic, if any.
    pub fn chat_id(&self) -> Option<i64> {
        let rest = self.0.strip_prefix(CHAT_TOPIC_PREFIX)?.strip_prefix('.')?;
        rest.parse().ok()
    }

    /// Whether this topic is matched by a subscription `pattern`.
    pub fn matches(&self, pattern: &str) -> bool {
        let mut topic_tokens = self.0.split('.');
        let mut pattern_tokens = pattern.split('.');
        loop {
            match (pattern_tokens.next(), topic_tokens.next()) {
                (Some(">"), Some(_)) => return true,
                (Some("*"), Some(_)) => {}
                (Some(p), Some(t)) if p == t => {}
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a subscription pattern (wildcards allowed, `>` only last).
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    if pattern.is_empty() {
        return Err("pattern must not be empty".to_string());
    }
    let tokens: Vec<&str> = pattern.split('.').collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            return Err(format!("pattern '{pattern}' contains an empty token"));
        }
        if *token == ">" && i + 1 != tokens.len() {
            return Err(format!("'>' must be the last token in '{pattern}'"));
        }
    }
    Ok(())
}
