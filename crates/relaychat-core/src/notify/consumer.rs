//! Notification consumer.
//!
//! Subscribes once to every chat topic and, for each message, emails every
//! member of the chat. Messages are processed one at a time on a dedicated
//! worker task fed by a bounded queue, so the broker handler never waits on
//! the directory or the mail relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use relaychat_types::error::{BrokerError, NotifyError};
use relaychat_types::message::ChatMessage;
use relaychat_types::topic::ALL_CHATS_PATTERN;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, MessageHandler, Subscription};
use crate::notify::NEW_MESSAGE_SUBJECT;
use crate::notify::dedupe::RecentIds;
use crate::notify::directory::RecipientDirectory;
use crate::notify::mailer::EmailSender;

/// Default depth of the consumer's inbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How processing of one message ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every recipient was emailed.
    Delivered,
    /// The message id was seen recently and was skipped.
    Duplicate,
    /// Recipient lookup failed; nobody was emailed.
    DirectoryFailed(String),
    /// Delivery to `recipient` failed; later recipients were not attempted.
    Stopped { recipient: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub message_id: i64,
    pub chat_id: i64,
    /// Recipients emailed, in order.
    pub delivered: Vec<String>,
    pub outcome: DeliveryOutcome,
}

/// Processes chat messages into emails.
pub struct NotificationWorker<D: RecipientDirectory, M: EmailSender> {
    directory: D,
    mailer: M,
    recent: RecentIds,
}

impl<D: RecipientDirectory, M: EmailSender> NotificationWorker<D, M> {
    /// `dedupe_window` of 0 disables suppression of redelivered messages.
    pub fn new(directory: D, mailer: M, dedupe_window: usize) -> Self {
        Self {
            directory,
            mailer,
            recent: RecentIds::new(dedupe_window),
        }
    }

    /// Email every recipient of the message's chat, stopping at the first
    /// failed delivery.
    pub async fn process(&mut self, message: &ChatMessage) -> DeliveryReport {
        let mut report = DeliveryReport {
            message_id: message.id,
            chat_id: message.chat_id,
            delivered: Vec::new(),
            outcome: DeliveryOutcome::Delivered,
        };

        if !self.recent.insert(message.id) {
            debug!(chat_id = message.chat_id, message_id = message.id, "duplicate message skipped");
            report.outcome = DeliveryOutcome::Duplicate;
            return report;
        }

        let recipients = match self.directory.recipients(message.chat_id).await {
            Ok(recipients) => recipients,
            Err(e) => {
                error!(chat_id = message.chat_id, error = %e, "failed to resolve recipients");
                report.outcome = DeliveryOutcome::DirectoryFailed(e.to_string());
                return report;
            }
        };

        debug!(
            chat_id = message.chat_id,
            message_id = message.id,
            recipients = recipients.len(),
            "sending notifications"
        );

        for recipient in recipients {
            match self
                .mailer
                .send(&recipient, NEW_MESSAGE_SUBJECT, &message.text)
                .await
            {
                Ok(()) => {
                    debug!(chat_id = message.chat_id, %recipient, "email sent");
                    report.delivered.push(recipient);
                }
                Err(e) => {
                    error!(chat_id = message.chat_id, %recipient, error = %e, "failed to send email");
                    let reason = match e {
                        NotifyError::Delivery { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    report.outcome = DeliveryOutcome::Stopped { recipient, reason };
                    return report;
                }
            }
        }

        report
    }
}

/// Running subscription to every chat topic.
pub struct NotificationConsumer<B: Broker> {
    broker: Arc<B>,
    subscription: Subscription,
    worker: Option<JoinHandle<()>>,
    processed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl<B: Broker> NotificationConsumer<B> {
    /// Subscribe to `chat.*` and start processing on a background task.
    pub async fn start<D, M>(
        broker: Arc<B>,
        mut worker: NotificationWorker<D, M>,
        queue_capacity: usize,
    ) -> Result<Self, BrokerError>
    where
        D: RecipientDirectory + 'static,
        M: EmailSender + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<ChatMessage>(queue_capacity.max(1));
        let processed = Arc::new(AtomicU64::new(0));
        let dropped = Arc::new(AtomicU64::new(0));

        let handler_dropped = Arc::clone(&dropped);
        let handler: MessageHandler = Arc::new(move |message: ChatMessage| {
            if let Err(mpsc::error::TrySendError::Full(message)) = tx.try_send(message) {
                handler_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    chat_id = message.chat_id,
                    message_id = message.id,
                    "notification queue full, message dropped"
                );
            }
        });

        let subscription = broker.subscribe(ALL_CHATS_PATTERN, handler).await?;

        let worker_processed = Arc::clone(&processed);
        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let report = worker.process(&message).await;
                worker_processed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    chat_id = report.chat_id,
                    message_id = report.message_id,
                    delivered = report.delivered.len(),
                    outcome = ?report.outcome,
                    "notification processed"
                );
            }
            debug!("notification worker stopped");
        });

        info!(pattern = ALL_CHATS_PATTERN, "notification consumer started");
        Ok(Self {
            broker,
            subscription,
            worker: Some(task),
            processed,
            dropped,
        })
    }

    /// Messages fully processed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Messages dropped because the inbound queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Unsubscribe and wait for queued messages to finish processing.
    pub async fn stop(mut self) -> Result<(), BrokerError> {
        self.broker.unsubscribe(&self.subscription).await?;
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "notification worker panicked");
                }
            }
        }
        info!("notification consumer stopped");
        Ok(())
    }
}

impl<B: Broker> Drop for NotificationConsumer<B> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
