//! History-then-live delivery for one consumer connection.
//!
//! The dispatcher attaches to the chat's feed *before* reading history, so a
//! message published while history is loading is never lost. Such a message
//! may show up in both places; live messages whose id is not greater than
//! the highest replayed history id are skipped. The cutoff is fixed once
//! history is sent, so live messages published out of id order still pass.

use std::sync::Arc;

use relaychat_types::error::{BrokerError, RepositoryError};
use relaychat_types::message::ChatMessage;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::chat::repository::ChatRepository;
use crate::stream::registry::SubscriptionRegistry;
use crate::stream::sink::MessageSink;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid chat id {0}")]
    InvalidChat(i64),

    #[error("failed to load history: {0}")]
    History(#[from] RepositoryError),

    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] BrokerError),
}

/// Why a dispatch stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEnd {
    /// The cancellation token fired.
    Cancelled,
    /// Sending to the consumer failed.
    ConsumerGone,
    /// The chat channel was torn down.
    FeedClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub replayed: usize,
    pub forwarded: usize,
    pub end: DispatchEnd,
}

pub struct StreamDispatcher<R: ChatRepository, B: Broker> {
    repo: R,
    registry: Arc<SubscriptionRegistry<B>>,
}

impl<R: ChatRepository, B: Broker> StreamDispatcher<R, B> {
    pub fn new(repo: R, registry: Arc<SubscriptionRegistry<B>>) -> Self {
        Self { repo, registry }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry<B>> {
        &self.registry
    }

    /// Stream the chat's history and then its live messages into `sink`
    /// until `cancel` fires, the consumer goes away, or the channel closes.
    ///
    /// A failing sink ends this dispatch only. The chat channel and its
    /// broker subscription stay in place for other consumers.
    pub async fn dispatch<S: MessageSink>(
        &self,
        chat_id: i64,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<DispatchSummary, DispatchError> {
        if chat_id <= 0 {
            return Err(DispatchError::InvalidChat(chat_id));
        }

        let mut feed = self.registry.attach(chat_id).await?;
        let history = self.repo.history(chat_id).await?;

        let mut summary = DispatchSummary {
            replayed: 0,
            forwarded: 0,
            end: DispatchEnd::FeedClosed,
        };
        let mut replayed_through = i64::MIN;

        for message in &history {
            if let Some(end) = deliver(chat_id, sink, message, &cancel).await {
                summary.end = end;
                return Ok(finish(chat_id, summary));
            }
            replayed_through = replayed_through.max(message.id);
            summary.replayed += 1;
        }
        debug!(chat_id, replayed = summary.replayed, "history replayed");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.end = DispatchEnd::Cancelled;
                    break;
                }
                next = feed.recv() => {
                    let Some(message) = next else {
                        summary.end = DispatchEnd::FeedClosed;
                        break;
                    };
                    if message.id <= replayed_through {
                        debug!(chat_id, message_id = message.id, "skipping message already replayed");
                        continue;
                    }
                    if let Some(end) = deliver(chat_id, sink, &message, &cancel).await {
                        summary.end = end;
                        break;
                    }
                    summary.forwarded += 1;
                }
            }
        }

        Ok(finish(chat_id, summary))
    }
}

/// Send one message, returning the end reason if the dispatch must stop.
async fn deliver<S: MessageSink>(
    chat_id: i64,
    sink: &mut S,
    message: &ChatMessage,
    cancel: &CancellationToken,
) -> Option<DispatchEnd> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(DispatchEnd::Cancelled),
        sent = sink.send(message) => match sent {
            Ok(()) => None,
            Err(e) => {
                warn!(chat_id, message_id = message.id, error = %e, "consumer send failed, ending stream");
                Some(DispatchEnd::ConsumerGone)
            }
        },
    }
}

fn finish(chat_id: i64, summary: DispatchSummary) -> DispatchSummary {
    info!(
        chat_id,
        replayed = summary.replayed,
        forwarded = summary.forwarded,
        end = ?summary.end,
        "stream ended"
    );
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
