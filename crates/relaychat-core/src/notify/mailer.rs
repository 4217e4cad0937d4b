use relaychat_types::error::NotifyError;

/// Outbound email delivery.
///
/// Implementations live in relaychat-infra (`LogMailer`, `HttpMailer`).
pub trait EmailSender: Send + Sync {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl std::future::Future<Output = Result<(), NotifyError>> + Send;
}
