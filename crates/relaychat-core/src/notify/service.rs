//! Direct send-email operation.

use relaychat_types::error::NotifyError;
use tracing::{error, info};

use crate::notify::mailer::EmailSender;

/// Sends a single email on request.
pub struct NotificationService<M: EmailSender> {
    mailer: M,
}

impl<M: EmailSender> NotificationService<M> {
    pub fn new(mailer: M) -> Self {
        Self { mailer }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Deliver one email. The recipient must look like an address.
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let to = to.trim();
        if to.is_empty() || !to.contains('@') {
            return Err(NotifyError::InvalidRecipient(to.to_string()));
        }
        self.mailer.send(to, subject, body).await.inspect_err(|e| {
            error!(recipient = %to, error = %e, "failed to send email");
        })?;
        info!(recipient = %to, "email sent");
        Ok(())
    }
}
