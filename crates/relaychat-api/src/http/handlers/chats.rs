//! Chat lifecycle handlers.
//!
//! Endpoints:
//! - POST   /api/v1/chats      - Create a chat with member addresses
//! - DELETE /api/v1/chats/{id} - Delete a chat and its messages

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use relaychat_types::message::Chat;
use serde::Deserialize;

use crate::http::error::AppError;
use crate::http::handlers::parse_chat_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    /// Member email addresses; the notifier emails them in this order.
    pub members: Vec<String>,
}

/// POST /api/v1/chats - Create a chat.
pub async fn create_chat(
    State(state): State<AppState>,
    Json(body): Json<CreateChatRequest>,
) -> Result<ApiResponse<Chat>, AppError> {
    let timer = RequestTimer::start();
    let chat = state.chat_service.create_chat(&body.members).await?;

    let href = format!("/api/v1/chats/{}", chat.id);
    Ok(timer
        .success(chat)
        .with_status(StatusCode::CREATED)
        .with_link("messages", &format!("{href}/messages"))
        .with_link("connect", &format!("{href}/connect"))
        .with_link("self", &href))
}

/// DELETE /api/v1/chats/{id} - Delete a chat and close its live stream.
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let chat_id = parse_chat_id(&id)?;

    state.chat_service.delete_chat(chat_id).await?;

    // Open connections see their feed close and end on their own.
    if let Err(e) = state.registry.teardown(chat_id).await {
        tracing::warn!(chat_id, error = %e, "failed to tear down chat stream");
    }

    Ok(timer.success(serde_json::json!({ "id": chat_id, "deleted": true })))
}
