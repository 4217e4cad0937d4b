//! Client for a running `relaychat serve`.
//!
//! Chat commands go through the server so that a sent message reaches the
//! server's live subscribers and its email notifier. Requests use the REST
//! API; `connect` opens the chat's WebSocket stream.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use futures_util::StreamExt;
use relaychat_types::message::{Chat, ChatMessage};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Server address used when `--server` is not given.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response envelope, as written by the API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(server: &str) -> Result<Self> {
        let base = server.trim_end_matches('/').to_string();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            bail!("server address must start with http:// or https://, got '{server}'");
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { base, http })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn create_chat(&self, members: &[String]) -> Result<Chat> {
        let request = self
            .http
            .post(self.url("/api/v1/chats"))
            .json(&json!({ "members": members }));
        self.call(request).await
    }

    pub async fn send_message(&self, chat_id: i64, sender: &str, text: &str) -> Result<ChatMessage> {
        let request = self
            .http
            .post(self.url(&format!("/api/v1/chats/{chat_id}/messages")))
            .json(&json!({ "sender": sender, "text": text }));
        self.call(request).await
    }

    pub async fn history(&self, chat_id: i64) -> Result<Vec<ChatMessage>> {
        let request = self.http.get(self.url(&format!("/api/v1/chats/{chat_id}/messages")));
        self.call(request).await
    }

    /// Open the chat's stream: stored messages first, then live ones.
    pub async fn connect(&self, chat_id: i64) -> Result<ChatStream> {
        let url = self.ws_url(&format!("/api/v1/chats/{chat_id}/connect"));
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                tracing::debug!(%url, "chat stream connected");
                Ok(ChatStream { socket })
            }
            Err(tungstenite::Error::Http(response)) if response.status().as_u16() == 404 => {
                bail!("chat {chat_id} not found")
            }
            Err(tungstenite::Error::Http(response)) => {
                bail!("server refused the stream for chat {chat_id} ({})", response.status())
            }
            Err(tungstenite::Error::Io(e)) => Err(self.unreachable_error(e)),
            Err(e) => Err(e).with_context(|| format!("failed to connect to {url}")),
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                self.unreachable_error(e)
            } else {
                anyhow!(e).context(format!("request to {} failed", self.base))
            }
        })?;

        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("unexpected response from {} ({status})", self.base))?;

        if let Some(error) = envelope.errors.into_iter().next() {
            bail!("{} ({})", error.message, error.code);
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("server answered {status} without data"))
    }

    fn unreachable_error(&self, cause: impl std::fmt::Display) -> anyhow::Error {
        anyhow!(
            "no relaychat server reachable at {} ({cause}); start one with `relaychat serve`",
            self.base
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn ws_url(&self, path: &str) -> String {
        match self.base.strip_prefix("https://") {
            Some(host) => format!("wss://{host}{path}"),
            None => format!("ws://{}{path}", self.base.trim_start_matches("http://")),
        }
    }
}

/// An open chat stream.
pub struct ChatStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ChatStream {
    /// Next message, or `None` once the server ends the stream.
    pub async fn next_message(&mut self) -> Result<Option<ChatMessage>> {
        while let Some(frame) = self.socket.next().await {
            match frame.context("chat stream failed")? {
                WsMessage::Text(text) => {
                    let message = serde_json::from_str(&text).context("malformed chat message")?;
                    return Ok(Some(message));
                }
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Close our side so the server stops streaming.
    pub async fn close(mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!("chat stream close failed: {e}");
        }
    }
}
