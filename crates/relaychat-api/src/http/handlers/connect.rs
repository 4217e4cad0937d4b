//! WebSocket stream of a chat.
//!
//! `GET /api/v1/chats/{id}/connect` upgrades to a WebSocket that receives
//! every stored message of the chat as a JSON text frame, oldest first,
//! followed by live messages as they are published. Client frames are
//! ignored except for close. The stream ends when the client disconnects,
//! the chat is deleted, or the server shuts down.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relaychat_core::chat::repository::ChatRepository;
use relaychat_core::stream::{MessageSink, SinkError};
use relaychat_types::error::ChatError;
use relaychat_types::message::ChatMessage;
use tokio_util::sync::CancellationToken;

use crate::http::error::AppError;
use crate::http::handlers::parse_chat_id;
use crate::state::AppState;

/// Write half of a client socket.
struct SocketSink {
    sender: SplitSink<WebSocket, Message>,
}

impl MessageSink for SocketSink {
    async fn send(&mut self, message: &ChatMessage) -> Result<(), SinkError> {
        let json = serde_json::to_string(message).map_err(|e| SinkError::Failed(e.to_string()))?;
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| SinkError::Disconnected)
    }
}

/// GET /api/v1/chats/{id}/connect
pub async fn connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let chat_id = parse_chat_id(&id)?;

    state
        .chat_service
        .repo()
        .get_chat(chat_id)
        .await
        .map_err(ChatError::from)?
        .ok_or(AppError::NotFound("Chat"))?;

    Ok(ws.on_upgrade(move |socket| stream_chat(socket, chat_id, state)))
}

async fn stream_chat(socket: WebSocket, chat_id: i64, state: AppState) {
    let (sender, receiver) = socket.split();
    let cancel = state.shutdown.child_token();

    let watcher = tokio::spawn(watch_client(receiver, cancel.clone()));
    let mut sink = SocketSink { sender };

    tracing::debug!(chat_id, "chat stream opened");
    match state.dispatcher.dispatch(chat_id, &mut sink, cancel.clone()).await {
        Ok(summary) => tracing::debug!(
            chat_id,
            replayed = summary.replayed,
            forwarded = summary.forwarded,
            end = ?summary.end,
            "chat stream closed"
        ),
        Err(e) => tracing::warn!(chat_id, error = %e, "chat stream failed"),
    }

    cancel.cancel();
    watcher.abort();
    let _ = sink.sender.close().await;
}

/// Cancel the stream once the client closes its side.
async fn watch_client(mut receiver: SplitStream<WebSocket>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!("chat stream receive error: {e}");
                    break;
                }
                // Ignore text, binary, ping, pong frames
                Some(Ok(_)) => {}
            },
        }
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use relaychat_types::message::ChatMessage;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    use crate::test_support::TestServer;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn open(server: &TestServer, chat_id: i64) -> Client {
        let url = server.ws_url(&format!("/api/v1/chats/{chat_id}/connect"));
        let (socket, _) = connect_async(url).await.unwrap();
        socket
    }

    async fn next_message(socket: &mut Client) -> ChatMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Wait until the server side stops sending: a close frame or EOF.
    async fn expect_closed(socket: &mut Client) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match socket.next().await {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await
        .unwrap();
    }

    async fn wait_for_consumers(server: &TestServer, chat_id: i64, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while server.state.registry.get(chat_id).map_or(0, |c| c.consumer_count()) != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn closing_one_socket_leaves_the_other_streaming() {
        let server = TestServer::start().await;
        let chat_id = server.create_chat(&["a@x.io"]).await;
        let seed = server.send(chat_id, "alice", "before").await;

        let mut first = open(&server, chat_id).await;
        let mut second = open(&server, chat_id).await;
        assert_eq!(next_message(&mut first).await.id, seed);
        assert_eq!(next_message(&mut second).await.id, seed);
        wait_for_consumers(&server, chat_id, 2).await;

        let live = server.send(chat_id, "bob", "live").await;
        let frame = next_message(&mut first).await;
        assert_eq!(frame.id, live);
        assert_eq!(frame.text, "live");
        assert_eq!(next_message(&mut second).await.id, live);

        first.close(None).await.unwrap();
        wait_for_consumers(&server, chat_id, 1).await;
        let topic = format!("chat.{chat_id}");
        assert_eq!(server.state.broker.subscription_count_for(&topic), 1);

        let after = server.send(chat_id, "bob", "after").await;
        assert_eq!(next_message(&mut second).await.id, after);
    }

    #[tokio::test]
    async fn dropped_connection_ends_its_stream() {
        let server = TestServer::start().await;
        let chat_id = server.create_chat(&["a@x.io"]).await;
        let seed = server.send(chat_id, "alice", "seed").await;

        let mut socket = open(&server, chat_id).await;
        assert_eq!(next_message(&mut socket).await.id, seed);
        wait_for_consumers(&server, chat_id, 1).await;

        drop(socket);
        wait_for_consumers(&server, chat_id, 0).await;
        assert_eq!(server.state.registry.chat_count(), 1);
    }

    #[tokio::test]
    async fn deleting_the_chat_closes_its_streams() {
        let server = TestServer::start().await;
        let chat_id = server.create_chat(&["a@x.io"]).await;
        server.send(chat_id, "alice", "seed").await;

        let mut socket = open(&server, chat_id).await;
        next_message(&mut socket).await;

        let resp = server
            .client
            .delete(format!("{}/api/v1/chats/{chat_id}", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        expect_closed(&mut socket).await;
        assert!(server.state.registry.get(chat_id).is_none());
    }

    #[tokio::test]
    async fn shutdown_ends_open_streams() {
        let server = TestServer::start().await;
        let chat_id = server.create_chat(&["a@x.io"]).await;
        server.send(chat_id, "alice", "seed").await;

        let mut socket = open(&server, chat_id).await;
        next_message(&mut socket).await;

        server.state.shutdown.cancel();
        expect_closed(&mut socket).await;
        wait_for_consumers(&server, chat_id, 0).await;
    }
}
