//! Message distribution and cross-service consistency logic for relaychat.
//!
//! This crate defines the broker abstraction and its in-process
//! implementation, the per-chat subscription registry and stream dispatcher,
//! message ingestion, the send-and-notify saga, and the notification
//! consumer. Storage, email delivery, and link previews are "ports" (traits)
//! implemented by `relaychat-infra`; this crate never depends on it.

pub mod broker;
pub mod chat;
pub mod notify;
pub mod saga;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;
