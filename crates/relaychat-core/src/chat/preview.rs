//! Link preview port.
//!
//! When a message consists of a single link, ingestion asks a
//! `LinkPreviewer` for OpenGraph-style metadata and appends it to the text.
//! Previews are best-effort: every error is swallowed by the caller.

use relaychat_types::message::LinkPreview;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("unexpected response: {0}")]
    Response(String),
}

/// Fetches preview metadata for a URL.
pub trait LinkPreviewer: Send + Sync {
    /// `Ok(None)` means the page had no usable metadata.
    fn preview(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Option<LinkPreview>, PreviewError>> + Send;
}

/// Previewer used when link previews are turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPreviewer;

impl LinkPreviewer for DisabledPreviewer {
    async fn preview(&self, _url: &str) -> Result<Option<LinkPreview>, PreviewError> {
        Ok(None)
    }
}
