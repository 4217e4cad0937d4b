//! HTTP/WebSocket API layer for relaychat.
//!
//! Axum-based API at `/api/v1/` with envelope response format and CORS
//! support. Live chat streams are served over WebSocket.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
