//! Message handlers.
//!
//! Endpoints:
//! - POST /api/v1/chats/{id}/messages - Send a message (validate, preview, persist, publish)
//! - GET  /api/v1/chats/{id}/messages - Full history, oldest first

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use relaychat_types::message::ChatMessage;
use serde::Deserialize;

use crate::http::error::AppError;
use crate::http::handlers::parse_chat_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender: String,
    pub text: String,
    /// Defaults to the time the server received the request.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// POST /api/v1/chats/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<ApiResponse<ChatMessage>, AppError> {
    let timer = RequestTimer::start();
    let chat_id = parse_chat_id(&id)?;

    let message = state
        .chat_service
        .send_message(chat_id, &body.sender, &body.text, body.timestamp)
        .await?;

    Ok(timer
        .success(message)
        .with_status(StatusCode::CREATED)
        .with_link("history", &format!("/api/v1/chats/{chat_id}/messages")))
}

/// GET /api/v1/chats/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<ChatMessage>>, AppError> {
    let timer = RequestTimer::start();
    let chat_id = parse_chat_id(&id)?;

    let messages = state.chat_service.history(chat_id).await?;
    Ok(timer.success(messages))
}
