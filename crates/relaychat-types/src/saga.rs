//! Saga types for the send-and-notify business transaction.
//!
//! A saga persists a message and then notifies each recipient. When a
//! notification fails the persisted message is deleted again (compensation).
//! Sagas live in memory only; they are not recovered after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SagaStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SagaStatus::Pending => write!(f, "pending"),
            SagaStatus::Completed => write!(f, "completed"),
            SagaStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SagaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SagaStatus::Pending),
            "completed" => Ok(SagaStatus::Completed),
            "failed" => Ok(SagaStatus::Failed),
            other => Err(format!("invalid saga status: '{other}'")),
        }
    }
}

/// One execution of the send-and-notify transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saga {
    pub id: Uuid,
    pub message_id: i64,
    pub chat_id: i64,
    pub status: SagaStatus,
    /// Notification re-attempts made so far, across all recipients.
    pub retries: u32,
    /// Re-attempts allowed per recipient before the saga gives up.
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Recipients that were notified. These are not retracted on failure.
    #[serde(default)]
    pub notified: Vec<String>,
    /// Why the saga failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Saga {
    /// Create a pending saga for `message_id`.
    pub fn pending(message_id: i64, chat_id: i64, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            message_id,
            chat_id,
            status: SagaStatus::Pending,
            retries: 0,
            max_retries,
            created_at: now,
            updated_at: now,
            notified: Vec::new(),
            failure: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = SagaStatus::Completed;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = SagaStatus::Failed;
        self.failure = Some(reason.into());
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status != SagaStatus::Pending
    }
}

/// Input to the saga orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaRequest {
    pub message_id: i64,
    pub chat_id: i64,
    pub text: String,
    /// Email addresses to notify, in order.
    pub recipients: Vec<String>,
    /// Author of the message. Defaults to the first recipient when absent.
    #[serde(default)]
    pub sender: Option<String>,
}
