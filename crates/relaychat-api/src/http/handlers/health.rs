//! GET /health - liveness and a snapshot of streaming load.

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "streaming_chats": state.registry.chat_count(),
        "broker_subscriptions": state.broker.subscription_count(),
        "broker_dropped": state.broker.dropped(),
    }))
}
