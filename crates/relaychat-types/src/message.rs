//! Chat and chat message types.
//!
//! A `ChatMessage` is the value that travels through the broker and is fanned
//! out to every live consumer of a chat. It is immutable once published;
//! consumers receive clones, never shared mutable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message.
///
/// `id` is assigned by the store and increases monotonically, so it doubles
/// as the ordering key when history and the live feed overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A message that has not been persisted yet.
///
/// The store turns this into a [`ChatMessage`] by assigning an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: i64,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// Attach a store-assigned id.
    pub fn with_id(self, id: i64) -> ChatMessage {
        ChatMessage {
            id,
            chat_id: self.chat_id,
            sender: self.sender,
            text: self.text,
            created_at: self.created_at,
        }
    }
}

/// A chat room and the email addresses of its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata fetched for a link posted as a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl LinkPreview {
    /// True when no metadata field was found.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image.is_none()
    }

    /// Render the preview as the text that replaces a bare link.
    ///
    /// The URL stays on the first line; each available field follows on its
    /// own line.
    pub fn render(&self) -> String {
        let mut out = self.url.clone();
        if let Some(title) = &self.title {
            out.push('\n');
            out.push_str(title);
        }
        if let Some(description) = &self.description {
            out.push('\n');
            out.push_str(description);
        }
        if let Some(image) = &self.image {
            out.push('\n');
            out.push_str(image);
        }
        out
    }
}

/// Return the URL if `text` consists of exactly one http(s) link.
pub fn single_link(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return None;
    }
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return None;
    }
    Some(trimmed)
}
