//! Saga handlers.
//!
//! Endpoints:
//! - POST /api/v1/sagas      - Persist a message and email every recipient, compensating on failure
//! - GET  /api/v1/sagas/{id} - Saga status

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use relaychat_types::saga::{Saga, SagaRequest};
use serde::Deserialize;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSagaRequest {
    pub message_id: i64,
    pub chat_id: i64,
    pub text: String,
    /// Recipients, notified in order.
    pub emails: Vec<String>,
    #[serde(default)]
    pub sender: Option<String>,
}

impl From<StartSagaRequest> for SagaRequest {
    fn from(body: StartSagaRequest) -> Self {
        SagaRequest {
            message_id: body.message_id,
            chat_id: body.chat_id,
            text: body.text,
            recipients: body.emails,
            sender: body.sender,
        }
    }
}

/// POST /api/v1/sagas
pub async fn start_saga(
    State(state): State<AppState>,
    Json(body): Json<StartSagaRequest>,
) -> Result<ApiResponse<Saga>, AppError> {
    let timer = RequestTimer::start();
    let saga = state.saga.execute(body.into()).await?;

    let href = format!("/api/v1/sagas/{}", saga.id);
    Ok(timer
        .success(saga)
        .with_status(StatusCode::CREATED)
        .with_link("self", &href))
}

/// GET /api/v1/sagas/{id}
pub async fn get_saga(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Saga>, AppError> {
    let timer = RequestTimer::start();
    let saga_id = id
        .parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid saga id: {id}")))?;

    let saga = state.saga.get(&saga_id)?;
    Ok(timer.success(saga))
}
