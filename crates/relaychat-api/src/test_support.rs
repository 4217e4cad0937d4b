//! Server fixture shared by the router, stream, and CLI client tests.

use relaychat_types::config::RelayConfig;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::http::router::build_router;
use crate::state::AppState;

/// A real server on an ephemeral port, backed by a temporary store.
pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    pub state: AppState,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let config = RelayConfig {
            link_preview: false,
            ..RelayConfig::default()
        };
        let state = AppState::from_config(config, dir.path().to_path_buf()).await.unwrap();
        let app = build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            state,
            _dir: dir,
        }
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.base.trim_start_matches("http://"))
    }

    pub async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(format!("{}{path}", self.base)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    pub async fn create_chat(&self, members: &[&str]) -> i64 {
        let (status, body) = self.post("/api/v1/chats", json!({ "members": members })).await;
        assert_eq!(status, 201);
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn send(&self, chat_id: i64, sender: &str, text: &str) -> i64 {
        let (status, body) = self
            .post(
                &format!("/api/v1/chats/{chat_id}/messages"),
                json!({ "sender": sender, "text": text }),
            )
            .await;
        assert_eq!(status, 201);
        body["data"]["id"].as_i64().unwrap()
    }
}
