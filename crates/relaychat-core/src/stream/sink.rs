//! Consumer side of a dispatch.

use relaychat_types::message::ChatMessage;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("consumer disconnected")]
    Disconnected,

    #[error("send failed: {0}")]
    Failed(String),
}

/// A single consumer connection that messages are pushed to.
pub trait MessageSink: Send {
    fn send(
        &mut self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), SinkError>> + Send;
}

impl MessageSink for mpsc::Sender<ChatMessage> {
    async fn send(&mut self, message: &ChatMessage) -> Result<(), SinkError> {
        mpsc::Sender::send(self, message.clone())
            .await
            .map_err(|_| SinkError::Disconnected)
    }
}
