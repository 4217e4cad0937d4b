//! Email notification of chat members.
//!
//! - `mailer` -- the `EmailSender` port
//! - `directory` -- the `RecipientDirectory` port (chat id to addresses)
//! - `dedupe` -- bounded window of recently processed message ids
//! - `consumer` -- `NotificationConsumer`, subscribed to every chat topic
//! - `service` -- `NotificationService`, the direct send-email operation

pub mod consumer;
pub mod dedupe;
pub mod directory;
pub mod mailer;
pub mod service;

pub use consumer::{DeliveryReport, NotificationConsumer, NotificationWorker};
pub use directory::RecipientDirectory;
pub use mailer::EmailSender;
pub use service::NotificationService;

/// Subject line of every new-message email.
pub const NEW_MESSAGE_SUBJECT: &str = "New message in chat";
