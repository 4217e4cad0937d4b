use relaychat_types::error::NotifyError;

/// Resolves the email addresses to notify for a chat.
pub trait RecipientDirectory: Send + Sync {
    /// Addresses in notification order. An unknown chat yields an empty list.
    fn recipients(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<String>, NotifyError>> + Send;
}
