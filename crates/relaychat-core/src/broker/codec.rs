//! Wire encoding for messages carried on a broker topic.
//!
//! A message travels as a self-describing JSON object:
//! `{"id":..,"chat_id":..,"sender":..,"text":..,"created_at":..}`.
//! Payloads are shared between subscribers, so they are encoded once per
//! publish into an `Arc<[u8]>`.

use std::sync::Arc;

use relaychat_types::error::BrokerError;
use relaychat_types::message::ChatMessage;

/// Encoded message bytes, shared by every subscriber queue.
pub type Payload = Arc<[u8]>;

pub fn encode(message: &ChatMessage) -> Result<Payload, BrokerError> {
    serde_json::to_vec(message)
        .map(Arc::from)
        .map_err(|e| BrokerError::Encode(e.to_string()))
}

pub fn decode(payload: &[u8]) -> Result<ChatMessage, BrokerError> {
    serde_json::from_slice(payload).map_err(|e| BrokerError::Decode(e.to_string()))
}
