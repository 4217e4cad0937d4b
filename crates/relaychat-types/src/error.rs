use thiserror::Error;

/// Errors from repository operations (used by trait definitions in relaychat-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors raised by a broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker is closed")]
    Closed,

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("failed to decode message: {0}")]
    Decode(String),

    #[error("unsupported broker url: {0}")]
    UnsupportedUrl(String),
}

/// Errors from message ingestion and chat management.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Empty or invalid fields; nothing was persisted or published.
    #[error("invalid message parameters")]
    InvalidMessage,

    #[error("invalid chat: {0}")]
    InvalidChat(String),

    /// The store rejected the message; it was not published.
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    /// The message is persisted but could not be handed to the broker.
    #[error("publish error: {0}")]
    Publish(#[from] BrokerError),
}

/// Errors from recipient resolution and email delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("recipient lookup failed: {0}")]
    Directory(String),

    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Errors returned by the saga orchestrator.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("invalid saga request: {0}")]
    Validation(String),

    #[error("failed to persist message: {0}")]
    Persistence(#[from] RepositoryError),

    /// A recipient could not be notified. The message was compensated.
    #[error("notification failed: {0}")]
    Notification(#[from] NotifyError),

    #[error("saga not found")]
    NotFound,
}
