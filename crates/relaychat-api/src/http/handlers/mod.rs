//! HTTP request handlers for the API.

pub mod chats;
pub mod connect;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod sagas;

use crate::http::error::AppError;

/// Parse a chat id from a path parameter, returning a 400 error on invalid format.
pub(crate) fn parse_chat_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation(format!("Invalid chat id: {raw}"))),
    }
}
