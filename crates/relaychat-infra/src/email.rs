//! Email senders.
//!
//! - [`LogMailer`] only logs the email; used when no relay is configured.
//! - [`HttpMailer`] posts the email as JSON to an HTTP email relay.
//!
//! The relay token is wrapped in [`secrecy::SecretString`] and is only
//! exposed when building the `Authorization` header.

use std::time::Duration;

use relaychat_core::notify::mailer::EmailSender;
use relaychat_types::config::EmailConfig;
use relaychat_types::error::NotifyError;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

/// Sender that writes the email to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl EmailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(recipient = %to, %subject, body_len = body.len(), "email (log only)");
        Ok(())
    }
}

/// JSON body accepted by the email relay.
#[derive(Debug, Serialize)]
struct RelayEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Sender that delivers through an HTTP email relay.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    from: String,
    token: Option<SecretString>,
}

impl std::fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailer")
            .field("endpoint", &self.endpoint)
            .field("from", &self.from)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpMailer {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(
        endpoint: impl Into<String>,
        from: impl Into<String>,
        token: Option<SecretString>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            from: from.into(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EmailSender for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let payload = RelayEmail {
            from: &self.from,
            to,
            subject,
            body,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| NotifyError::Delivery {
            recipient: to.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::Delivery {
                recipient: to.to_string(),
                reason: format!("relay returned {status}: {}", detail.trim()),
            });
        }

        debug!(recipient = %to, "email accepted by relay");
        Ok(())
    }
}

/// The configured sender: a relay when an endpoint is set, otherwise the log.
#[derive(Debug, Clone)]
pub enum Mailer {
    Log(LogMailer),
    Http(HttpMailer),
}

impl Mailer {
    pub fn from_config(config: &EmailConfig, token: Option<SecretString>) -> Result<Self, reqwest::Error> {
        match config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => Ok(Mailer::Http(HttpMailer::new(endpoint, &config.from, token)?)),
            None => Ok(Mailer::Log(LogMailer)),
        }
    }
}

impl EmailSender for Mailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        match self {
            Mailer::Log(mailer) => mailer.send(to, subject, body).await,
            Mailer::Http(mailer) => mailer.send(to, subject, body).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn spawn_relay(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&received);
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let store = Arc::clone(&store);
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    store.lock().unwrap().push((auth, body));
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/send"), received)
    }

    #[tokio::test]
    async fn test_http_mailer_posts_json_with_bearer_token() {
        let (endpoint, received) = spawn_relay(StatusCode::ACCEPTED).await;
        let mailer = HttpMailer::new(
            endpoint,
            "noreply@relaychat.local",
            Some(SecretString::from("s3cret".to_string())),
        )
        .unwrap();

        mailer.send("a@x.io", "New message in chat", "hi").await.unwrap();

        let received = received.lock().unwrap();
        let (auth, body) = &received[0];
        assert_eq!(auth.as_deref(), Some("Bearer s3cret"));
        assert_eq!(body["to"], "a@x.io");
        assert_eq!(body["from"], "noreply@relaychat.local");
        assert_eq!(body["subject"], "New message in chat");
        assert_eq!(body["body"], "hi");
    }

    #[tokio::test]
    async fn test_http_mailer_maps_error_status_to_delivery_error() {
        let (endpoint, _received) = spawn_relay(StatusCode::SERVICE_UNAVAILABLE).await;
        let mailer = HttpMailer::new(endpoint, "noreply@relaychat.local", None).unwrap();

        let err = mailer.send("a@x.io", "s", "b").await.unwrap_err();
        match err {
            NotifyError::Delivery { recipient, reason } => {
                assert_eq!(recipient, "a@x.io");
                assert!(reason.contains("503"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let mailer = HttpMailer::new(
            "http://relay.local/send",
            "a@b.c",
            Some(SecretString::from("hunter2".to_string())),
        )
        .unwrap();
        let debug = format!("{mailer:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_mailer_from_config() {
        let mut config = EmailConfig::default();
        assert!(matches!(Mailer::from_config(&config, None).unwrap(), Mailer::Log(_)));

        config.endpoint = Some("http://relay.local/send".to_string());
        assert!(matches!(Mailer::from_config(&config, None).unwrap(), Mailer::Http(_)));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        LogMailer.send("a@x.io", "s", "b").await.unwrap();
    }
}
