//! ChatRepository trait definition.
//!
//! Provides chat and message persistence. Follows the RPITIT pattern used
//! by every repository trait in this crate.

use relaychat_types::error::RepositoryError;
use relaychat_types::message::{Chat, ChatMessage, NewMessage};

/// Repository trait for chats and their messages.
///
/// Implementations live in relaychat-infra (e.g., `SqliteChatRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Create a chat with the given member addresses.
    fn create_chat(
        &self,
        members: &[String],
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Get a chat by id.
    fn get_chat(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Delete a chat and all of its messages.
    ///
    /// Returns `RepositoryError::NotFound` if the chat does not exist.
    fn delete_chat(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist a new message, letting the store assign its id.
    fn append_message(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Persist a message under a caller-supplied id.
    ///
    /// Returns `RepositoryError::Conflict` if the id is already taken.
    fn insert_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a single message by id.
    fn get_message(
        &self,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Delete a message by id. Deleting a missing message is not an error.
    fn delete_message(
        &self,
        message_id: i64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All messages of a chat, ordered by id ASC.
    fn history(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;
}
