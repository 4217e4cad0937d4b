//! Message ingestion and chat lifecycle.
//!
//! `ChatService` validates an incoming message, optionally enriches a bare
//! link with preview metadata, persists it and then publishes it on the
//! chat's topic. Persistence always happens before publication, so any
//! message a live consumer sees is already in history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relaychat_types::error::ChatError;
use relaychat_types::message::{Chat, ChatMessage, NewMessage, single_link};
use relaychat_types::topic::Topic;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::chat::preview::LinkPreviewer;
use crate::chat::repository::ChatRepository;

/// Ingests chat messages and manages chats.
///
/// Generic over the repository, previewer, and broker so relaychat-core
/// never depends on relaychat-infra.
pub struct ChatService<R: ChatRepository, P: LinkPreviewer, B: Broker> {
    repo: R,
    previewer: P,
    broker: Arc<B>,
}

impl<R: ChatRepository, P: LinkPreviewer, B: Broker> ChatService<R, P, B> {
    pub fn new(repo: R, previewer: P, broker: Arc<B>) -> Self {
        Self {
            repo,
            previewer,
            broker,
        }
    }

    /// Access the chat repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    /// Validate, enrich, persist, and publish a message.
    ///
    /// On `ChatError::Publish` the message is persisted but live consumers
    /// did not receive it. `timestamp` defaults to now.
    pub async fn send_message(
        &self,
        chat_id: i64,
        sender: &str,
        text: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<ChatMessage, ChatError> {
        if chat_id <= 0 || sender.trim().is_empty() || text.trim().is_empty() {
            return Err(ChatError::InvalidMessage);
        }

        let text = self.enrich(chat_id, text).await;
        let new_message = NewMessage {
            chat_id,
            sender: sender.to_string(),
            text,
            created_at: timestamp.unwrap_or_else(Utc::now),
        };

        let message = self.repo.append_message(&new_message).await?;
        debug!(chat_id, message_id = message.id, "message persisted");

        let topic = Topic::for_chat(chat_id);
        self.broker.publish(&topic, &message).await.map_err(|e| {
            warn!(chat_id, message_id = message.id, error = %e, "message persisted but not published");
            ChatError::Publish(e)
        })?;

        info!(chat_id, message_id = message.id, %topic, "message sent");
        Ok(message)
    }

    /// Replace a single-link text with its rendered preview, if one exists.
    async fn enrich(&self, chat_id: i64, text: &str) -> String {
        let Some(url) = single_link(text) else {
            return text.to_string();
        };
        match self.previewer.preview(url).await {
            Ok(Some(preview)) if !preview.is_empty() => preview.render(),
            Ok(_) => text.to_string(),
            Err(e) => {
                warn!(chat_id, url, error = %e, "link preview failed, sending text unchanged");
                text.to_string()
            }
        }
    }

    /// Create a chat with at least one member.
    pub async fn create_chat(&self, members: &[String]) -> Result<Chat, ChatError> {
        let members: Vec<String> = members
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if members.is_empty() {
            return Err(ChatError::InvalidChat("member list is empty".to_string()));
        }
        let chat = self.repo.create_chat(&members).await?;
        info!(chat_id = chat.id, members = chat.members.len(), "chat created");
        Ok(chat)
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<(), ChatError> {
        if chat_id <= 0 {
            return Err(ChatError::InvalidChat(format!("invalid chat id {chat_id}")));
        }
        self.repo.delete_chat(chat_id).await?;
        info!(chat_id, "chat deleted");
        Ok(())
    }

    /// Persisted messages of a chat in stored order.
    pub async fn history(&self, chat_id: i64) -> Result<Vec<ChatMessage>, ChatError> {
        if chat_id <= 0 {
            return Err(ChatError::InvalidChat(format!("invalid chat id {chat_id}")));
        }
        Ok(self.repo.history(chat_id).await?)
    }
}
