//! POST /api/v1/notifications/email - send one email directly.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

pub async fn send_email(
    State(state): State<AppState>,
    Json(body): Json<SendEmailRequest>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();

    state
        .notifications
        .send_email(&body.to, &body.subject, &body.body)
        .await?;

    Ok(timer
        .success(serde_json::json!({ "to": body.to.trim(), "sent": true }))
        .with_status(StatusCode::ACCEPTED))
}
