//! Application error type mapping to HTTP status codes and envelope format.
//!
//! Validation errors carry their message to the client. Store, broker, and
//! relay failures are logged with their cause and answered with a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relaychat_core::saga::SagaFailure;
use relaychat_types::error::{ChatError, NotifyError, RepositoryError, SagaError};
use uuid::Uuid;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Chat(ChatError),
    Saga(SagaError),
    /// A saga that was recorded and then failed. Its snapshot stays
    /// readable under `GET /api/v1/sagas/{id}`.
    SagaFailed { saga_id: Uuid, error: SagaError },
    Notify(NotifyError),
    /// Malformed request input.
    Validation(String),
    NotFound(&'static str),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<SagaError> for AppError {
    fn from(e: SagaError) -> Self {
        AppError::Saga(e)
    }
}

impl From<SagaFailure> for AppError {
    fn from(failure: SagaFailure) -> Self {
        match failure.saga_id {
            Some(saga_id) => AppError::SagaFailed {
                saga_id,
                error: failure.error,
            },
            None => AppError::Saga(failure.error),
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(e: NotifyError) -> Self {
        AppError::Notify(e)
    }
}

impl AppError {
    /// Status, machine code, and client-facing message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(e @ ChatError::InvalidMessage) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::Chat(ChatError::InvalidChat(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(ChatError::Persistence(RepositoryError::NotFound)) => {
                (StatusCode::NOT_FOUND, "CHAT_NOT_FOUND", "Chat not found".to_string())
            }
            AppError::Chat(ChatError::Persistence(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                "Failed to store message".to_string(),
            ),
            AppError::Chat(ChatError::Publish(_)) => (
                StatusCode::BAD_GATEWAY,
                "PUBLISH_ERROR",
                "Message stored but not delivered to live subscribers".to_string(),
            ),
            AppError::Saga(e) | AppError::SagaFailed { error: e, .. } => saga_parts(e),
            AppError::Notify(NotifyError::InvalidRecipient(msg)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("invalid recipient '{msg}'"),
            ),
            AppError::Notify(_) => (
                StatusCode::BAD_GATEWAY,
                "DELIVERY_FAILED",
                "Email delivery failed".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found")),
        }
    }
}

fn saga_parts(error: &SagaError) -> (StatusCode, &'static str, String) {
    match error {
        SagaError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        SagaError::Persistence(RepositoryError::Conflict(_)) => (
            StatusCode::CONFLICT,
            "MESSAGE_CONFLICT",
            "A message with this id already exists".to_string(),
        ),
        SagaError::Persistence(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, "CHAT_NOT_FOUND", "Chat not found".to_string())
        }
        SagaError::Persistence(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PERSISTENCE_ERROR",
            "Failed to store message".to_string(),
        ),
        SagaError::Notification(_) => (
            StatusCode::BAD_GATEWAY,
            "NOTIFICATION_FAILED",
            "Notification failed; the message was rolled back".to_string(),
        ),
        SagaError::NotFound => (StatusCode::NOT_FOUND, "SAGA_NOT_FOUND", "Saga not found".to_string()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(%code, error = ?self, "request failed");
        } else {
            tracing::debug!(%code, error = ?self, "request rejected");
        }

        let request_id = Uuid::now_v7().to_string();
        let response = ApiResponse::error(status, code, &message, request_id);
        match self {
            AppError::SagaFailed { saga_id, .. } => response
                .with_link("saga", &format!("/api/v1/sagas/{saga_id}"))
                .into_response(),
            _ => response.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaychat_types::error::BrokerError;

    #[test]
    fn validation_errors_expose_message() {
        let (status, code, message) =
            AppError::Saga(SagaError::Validation("text must not be empty".into())).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");
        assert_eq!(message, "text must not be empty");
    }

    #[test]
    fn persistence_errors_hide_cause() {
        let err = AppError::Chat(ChatError::Persistence(RepositoryError::Query(
            "no such table: messages".into(),
        )));
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "PERSISTENCE_ERROR");
        assert!(!message.contains("no such table"));
    }

    #[test]
    fn publish_is_distinct_from_persistence() {
        let (status, code, _) = AppError::Chat(ChatError::Publish(BrokerError::Closed)).parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "PUBLISH_ERROR");
    }

    #[test]
    fn unknown_chat_is_not_found() {
        let err: AppError = ChatError::Persistence(RepositoryError::NotFound).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_saga_message_is_conflict() {
        let err: AppError = SagaError::Persistence(RepositoryError::Conflict("id 5".into())).into();
        assert_eq!(err.parts().0, StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_message_uses_error_text() {
        let (status, _, message) = AppError::Chat(ChatError::InvalidMessage).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "invalid message parameters");
    }

    #[test]
    fn recorded_saga_failure_keeps_its_id() {
        let saga_id = Uuid::now_v7();
        let err: AppError = SagaFailure {
            saga_id: Some(saga_id),
            error: SagaError::Notification(NotifyError::Delivery {
                recipient: "b@x.io".into(),
                reason: "relay down".into(),
            }),
        }
        .into();
        assert!(matches!(err, AppError::SagaFailed { saga_id: id, .. } if id == saga_id));
        assert_eq!(err.parts().1, "NOTIFICATION_FAILED");

        let rejected: AppError = SagaFailure {
            saga_id: None,
            error: SagaError::Validation("text must not be empty".into()),
        }
        .into();
        assert!(matches!(rejected, AppError::Saga(SagaError::Validation(_))));
    }
}
