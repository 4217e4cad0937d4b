//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`, with `/health` also served at the root.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Chats
        .route("/chats", post(handlers::chats::create_chat))
        .route("/chats/{id}", delete(handlers::chats::delete_chat))
        // Messages
        .route(
            "/chats/{id}/messages",
            post(handlers::messages::send_message).get(handlers::messages::list_messages),
        )
        // Live stream
        .route("/chats/{id}/connect", get(handlers::connect::connect))
        // Sagas
        .route("/sagas", post(handlers::sagas::start_saga))
        .route("/sagas/{id}", get(handlers::sagas::get_saga))
        // Notifications
        .route(
            "/notifications/email",
            post(handlers::notifications::send_email),
        )
        .route("/health", get(handlers::health::health_check));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
