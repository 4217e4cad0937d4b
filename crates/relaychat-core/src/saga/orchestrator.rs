//! Saga orchestrator for the send-and-notify transaction.
//!
//! Steps, in order:
//! 1. record a `Pending` saga,
//! 2. persist the message under the caller-supplied id,
//! 3. email each recipient sequentially.
//!
//! When a recipient cannot be notified the persisted message is deleted
//! (compensation) and the saga ends `Failed`. Emails that already went out
//! are not retracted; they stay listed in `Saga::notified`.

use std::sync::Arc;

use chrono::Utc;
use relaychat_types::error::{NotifyError, SagaError};
use relaychat_types::message::ChatMessage;
use relaychat_types::saga::{Saga, SagaRequest};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::notify::NEW_MESSAGE_SUBJECT;
use crate::notify::mailer::EmailSender;
use crate::saga::log::SagaLog;
use crate::saga::retry::RetryPolicy;

/// A saga that did not complete.
///
/// `saga_id` names the `Failed` snapshot in the log. It is `None` when the
/// request was rejected before a saga was recorded.
#[derive(Debug)]
pub struct SagaFailure {
    pub saga_id: Option<Uuid>,
    pub error: SagaError,
}

impl From<SagaFailure> for SagaError {
    fn from(failure: SagaFailure) -> Self {
        failure.error
    }
}

pub struct SagaOrchestrator<R: ChatRepository, M: EmailSender> {
    repo: R,
    mailer: M,
    log: Arc<SagaLog>,
    retry: RetryPolicy,
}

impl<R: ChatRepository, M: EmailSender> SagaOrchestrator<R, M> {
    pub fn new(repo: R, mailer: M, retry: RetryPolicy) -> Self {
        Self {
            repo,
            mailer,
            log: Arc::new(SagaLog::new()),
            retry,
        }
    }

    /// Share an existing saga log.
    pub fn with_log(mut self, log: Arc<SagaLog>) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &Arc<SagaLog> {
        &self.log
    }

    /// Snapshot of a saga started by this process.
    pub fn get(&self, id: &Uuid) -> Result<Saga, SagaError> {
        self.log.get(id).ok_or(SagaError::NotFound)
    }

    /// Run the saga to completion.
    ///
    /// Returns the `Completed` saga, or the error of the step that failed.
    /// On `SagaError::Notification` compensation has already been attempted.
    pub async fn start(&self, request: SagaRequest) -> Result<Saga, SagaError> {
        self.execute(request).await.map_err(SagaError::from)
    }

    /// Like [`start`](Self::start), but a failure keeps the id of the logged
    /// saga so its `Failed` snapshot can be looked up.
    pub async fn execute(&self, request: SagaRequest) -> Result<Saga, SagaFailure> {
        validate(&request).map_err(|error| SagaFailure {
            saga_id: None,
            error,
        })?;

        let mut saga = Saga::pending(request.message_id, request.chat_id, self.retry.max_retries);
        self.log.record(&saga);
        info!(
            saga_id = %saga.id,
            message_id = request.message_id,
            chat_id = request.chat_id,
            recipients = request.recipients.len(),
            "saga started"
        );

        let sender = request
            .sender
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| request.recipients[0].clone());
        let message = ChatMessage {
            id: request.message_id,
            chat_id: request.chat_id,
            sender,
            text: request.text.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.repo.insert_message(&message).await {
            error!(saga_id = %saga.id, message_id = message.id, error = %e, "failed to persist message");
            saga.fail(format!("persist: {e}"));
            self.log.record(&saga);
            return Err(SagaFailure {
                saga_id: Some(saga.id),
                error: SagaError::Persistence(e),
            });
        }

        for recipient in &request.recipients {
            if let Err(e) = self.notify(&mut saga, recipient, &request.text).await {
                error!(saga_id = %saga.id, %recipient, error = %e, "notification failed, compensating");
                self.compensate(&saga).await;
                saga.fail(format!("notify {recipient}: {e}"));
                self.log.record(&saga);
                return Err(SagaFailure {
                    saga_id: Some(saga.id),
                    error: SagaError::Notification(e),
                });
            }
            self.log.record(&saga);
        }

        saga.complete();
        self.log.record(&saga);
        info!(saga_id = %saga.id, message_id = message.id, retries = saga.retries, "saga completed");
        Ok(saga)
    }

    /// Email one recipient, re-attempting up to the retry limit.
    async fn notify(
        &self,
        saga: &mut Saga,
        recipient: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let mut attempt = 0;
        loop {
            match self.mailer.send(recipient, NEW_MESSAGE_SUBJECT, body).await {
                Ok(()) => {
                    saga.notified.push(recipient.to_string());
                    return Ok(());
                }
                Err(e) if self.retry.should_retry(attempt) => {
                    attempt += 1;
                    saga.retries += 1;
                    warn!(saga_id = %saga.id, %recipient, attempt, error = %e, "retrying notification");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delete the persisted message. Failure is logged only.
    async fn compensate(&self, saga: &Saga) {
        match self.repo.delete_message(saga.message_id).await {
            Ok(()) => info!(saga_id = %saga.id, message_id = saga.message_id, "message rolled back"),
            Err(e) => error!(
                saga_id = %saga.id,
                message_id = saga.message_id,
                error = %e,
                "failed to roll back message"
            ),
        }
    }
}

fn validate(request: &SagaRequest) -> Result<(), SagaError> {
    if request.message_id <= 0 {
        return Err(SagaError::Validation("message_id must be positive".to_string()));
    }
    if request.chat_id <= 0 {
        return Err(SagaError::Validation("chat_id must be positive".to_string()));
    }
    if request.text.trim().is_empty() {
        return Err(SagaError::Validation("text must not be empty".to_string()));
    }
    if request.recipients.is_empty() {
        return Err(SagaError::Validation("at least one recipient is required".to_string()));
    }
    if request.recipients.iter().any(|r| r.trim().is_empty()) {
        return Err(SagaError::Validation("recipients must not be empty".to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
