//! OpenGraph link previewer.
//!
//! Fetches the linked page and extracts `og:title`, `og:description` and
//! `og:image` from its `<meta>` tags, falling back to `<title>` for the
//! title. Only HTML responses are inspected and at most
//! [`MAX_BODY_BYTES`] of the body are read.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use relaychat_core::chat::preview::{DisabledPreviewer, LinkPreviewer, PreviewError};
use relaychat_types::config::RelayConfig;
use relaychat_types::message::LinkPreview;
use tracing::debug;

/// Upper bound on the number of body bytes read from a linked page.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));

/// Previewer that fetches pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLinkPreviewer {
    client: reqwest::Client,
}

impl HttpLinkPreviewer {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("relaychat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl LinkPreviewer for HttpLinkPreviewer {
    async fn preview(&self, url: &str) -> Result<Option<LinkPreview>, PreviewError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PreviewError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::Response(format!("status {status}")));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("html"));
        if !is_html {
            debug!(url, "link is not an HTML page, no preview");
            return Ok(None);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PreviewError::Fetch(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_BODY_BYTES {
                body.truncate(MAX_BODY_BYTES);
                break;
            }
        }

        let html = String::from_utf8_lossy(&body);
        let preview = extract_preview(url, &html);
        Ok((!preview.is_empty()).then_some(preview))
    }
}

/// The configured previewer: HTTP when previews are on, otherwise disabled.
#[derive(Debug, Clone)]
pub enum Previewer {
    Disabled(DisabledPreviewer),
    Http(HttpLinkPreviewer),
}

impl Previewer {
    pub fn from_config(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        if !config.link_preview {
            return Ok(Previewer::Disabled(DisabledPreviewer));
        }
        let timeout = Duration::from_millis(config.link_preview_timeout_ms);
        Ok(Previewer::Http(HttpLinkPreviewer::new(timeout)?))
    }
}

impl LinkPreviewer for Previewer {
    async fn preview(&self, url: &str) -> Result<Option<LinkPreview>, PreviewError> {
        match self {
            Previewer::Disabled(previewer) => previewer.preview(url).await,
            Previewer::Http(previewer) => previewer.preview(url).await,
        }
    }
}

/// Extract OpenGraph metadata from an HTML document.
pub fn extract_preview(url: &str, html: &str) -> LinkPreview {
    let mut preview = LinkPreview {
        url: url.to_string(),
        ..Default::default()
    };

    for tag in META_TAG.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for attr in ATTRIBUTE.captures_iter(tag.as_str()) {
            let name = attr[1].to_ascii_lowercase();
            let value = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str());
            match name.as_str() {
                "property" | "name" => key = value.map(str::to_ascii_lowercase),
                "content" => content = value.map(decode_entities),
                _ => {}
            }
        }
        let (Some(key), Some(content)) = (key, content) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }
        let slot = match key.as_str() {
            "og:title" => &mut preview.title,
            "og:description" => &mut preview.description,
            "og:image" => &mut preview.image,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(content);
        }
    }

    if preview.title.is_none() {
        preview.title = TITLE_TAG
            .captures(html)
            .map(|c| decode_entities(c[1].trim()))
            .filter(|t| !t.is_empty());
    }

    preview
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
