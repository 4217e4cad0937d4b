//! In-process broker built on bounded `tokio::sync::mpsc` queues.
//!
//! Each subscription owns a bounded queue and a worker task that decodes
//! payloads and invokes the handler in arrival order. `publish` encodes the
//! message once and `try_send`s it to every matching queue, so a slow
//! subscriber loses messages rather than stalling the publisher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use relaychat_types::error::BrokerError;
use relaychat_types::message::ChatMessage;
use relaychat_types::topic::{Topic, validate_pattern};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::codec::{self, Payload};
use super::{Broker, MessageHandler, Subscription};

/// Default per-subscription queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// URL scheme selecting this broker.
pub const MEMORY_SCHEME: &str = "memory://";

struct SubscriberSlot {
    pattern: String,
    tx: mpsc::Sender<Payload>,
    worker: JoinHandle<()>,
}

/// Broker that delivers within the current process.
pub struct InMemoryBroker {
    subscribers: DashMap<Uuid, SubscriberSlot>,
    buffer: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl InMemoryBroker {
    /// Create a broker whose subscriptions each buffer up to `buffer` messages.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Build a broker from a configured URL. Only `memory://` is supported.
    pub fn from_url(url: &str, buffer: usize) -> Result<Self, BrokerError> {
        if url.trim() == MEMORY_SCHEME || url.trim().is_empty() {
            Ok(Self::new(buffer))
        } else {
            Err(BrokerError::UnsupportedUrl(url.to_string()))
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of live subscriptions registered with exactly `pattern`.
    pub fn subscription_count_for(&self, pattern: &str) -> usize {
        self.subscribers
            .iter()
            .filter(|slot| slot.pattern == pattern)
            .count()
    }

    /// Messages dropped so far because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBroker")
            .field("subscriptions", &self.subscribers.len())
            .field("buffer", &self.buffer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Broker for InMemoryBroker {
    async fn publish(&self, topic: &Topic, message: &ChatMessage) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }

        let payload = codec::encode(message)?;
        let mut delivered = 0usize;

        for slot in self.subscribers.iter() {
            if !topic.matches(&slot.pattern) {
                continue;
            }
            match slot.tx.try_send(Payload::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        %topic,
                        subscription = %slot.key(),
                        "subscriber queue full, message dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(%topic, subscription = %slot.key(), "subscriber worker gone");
                }
            }
        }

        debug!(%topic, message_id = message.id, delivered, "published message");
        Ok(())
    }

    async fn subscribe(
        &self,
        pattern: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        validate_pattern(pattern).map_err(BrokerError::InvalidTopic)?;

        let subscription = Subscription::new(pattern);
        let (tx, mut rx) = mpsc::channel::<Payload>(self.buffer);
        let sub_id = subscription.id();

        let worker = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                match codec::decode(&payload) {
                    Ok(message) => handler(message),
                    Err(err) => {
                        warn!(subscription = %sub_id, error = %err, "dropping undecodable payload");
                    }
                }
            }
            debug!(subscription = %sub_id, "subscription worker stopped");
        });

        self.subscribers.insert(
            sub_id,
            SubscriberSlot {
                pattern: pattern.to_string(),
                tx,
                worker,
            },
        );
        debug!(%pattern, subscription = %sub_id, "subscribed");

        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), BrokerError> {
        if let Some((_, slot)) = self.subscribers.remove(&subscription.id()) {
            slot.worker.abort();
            debug!(pattern = %slot.pattern, subscription = %subscription.id(), "unsubscribed");
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::Release);
        let ids: Vec<Uuid> = self.subscribers.iter().map(|slot| *slot.key()).collect();
        for id in ids {
            if let Some((_, slot)) = self.subscribers.remove(&id) {
                slot.worker.abort();
            }
        }
        debug!("broker closed");
        Ok(())
    }
}

impl Drop for InMemoryBroker {
    fn drop(&mut self) {
        for slot in self.subscribers.iter() {
            slot.worker.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::message;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn collecting_handler() -> (MessageHandler, UnboundedReceiver<ChatMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |msg| {
            let _ = tx.send(msg);
        });
        (handler, rx)
    }

    async fn recv(rx: &mut UnboundedReceiver<ChatMessage>) -> ChatMessage {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("handler channel closed")
    }

    #[tokio::test]
    async fn publish_delivers_to_exact_topic_subscriber() {
        let broker = InMemoryBroker::default();
        let (handler, mut rx) = collecting_handler();
        broker.subscribe("chat.1", handler).await.unwrap();

        let msg = message(1, 1, "hello");
        broker.publish(&Topic::for_chat(1), &msg).await.unwrap();

        assert_eq!(recv(&mut rx).await, msg);
    }

    #[tokio::test]
    async fn wildcard_subscriber_sees_every_chat() {
        let broker = InMemoryBroker::default();
        let (handler, mut rx) = collecting_handler();
        broker.subscribe("chat.*", handler).await.unwrap();

        broker.publish(&Topic::for_chat(1), &message(1, 1, "a")).await.unwrap();
        broker.publish(&Topic::for_chat(2), &message(2, 2, "b")).await.unwrap();

        assert_eq!(recv(&mut rx).await.chat_id, 1);
        assert_eq!(recv(&mut rx).await.chat_id, 2);
    }

    #[tokio::test]
    async fn other_chat_is_never_observed() {
        let broker = InMemoryBroker::default();
        let (handler, mut rx) = collecting_handler();
        broker.subscribe("chat.2", handler).await.unwrap();

        broker.publish(&Topic::for_chat(1), &message(1, 1, "not for you")).await.unwrap();
        broker.publish(&Topic::for_chat(2), &message(2, 2, "for you")).await.unwrap();

        let received = recv(&mut rx).await;
        assert_eq!(received.text, "for you");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_order_matches_publish_order() {
        let broker = InMemoryBroker::default();
        let (handler, mut rx) = collecting_handler();
        broker.subscribe("chat.5", handler).await.unwrap();

        for i in 1..=50 {
            broker
                .publish(&Topic::for_chat(5), &message(i, 5, &format!("m{i}")))
                .await
                .unwrap();
        }
        for i in 1..=50 {
            assert_eq!(recv(&mut rx).await.id, i);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_subscriber_queue_drops_without_blocking_publisher() {
        let broker = InMemoryBroker::new(2);
        let gate = Arc::new(Mutex::new(()));
        let delivered = Arc::new(AtomicU64::new(0));

        let handler_gate = Arc::clone(&gate);
        let handler_count = Arc::clone(&delivered);
        let handler: MessageHandler = Arc::new(move |_msg| {
            let _guard = handler_gate.lock().unwrap();
            handler_count.fetch_add(1, Ordering::SeqCst);
        });
        broker.subscribe("chat.1", handler).await.unwrap();

        let guard = gate.lock().unwrap();
        let publish_all = async {
            for i in 1..=10 {
                broker.publish(&Topic::for_chat(1), &message(i, 1, "x")).await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(1), publish_all)
            .await
            .expect("publisher blocked on a full subscriber");
        drop(guard);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let delivered = delivered.load(Ordering::SeqCst);
        assert!(broker.dropped() > 0);
        assert_eq!(delivered + broker.dropped(), 10);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let broker = InMemoryBroker::default();
        let (handler, mut rx) = collecting_handler();
        let sub = broker.subscribe("chat.1", handler).await.unwrap();
        assert_eq!(broker.subscription_count(), 1);

        broker.unsubscribe(&sub).await.unwrap();
        assert_eq!(broker.subscription_count(), 0);

        broker.publish(&Topic::for_chat(1), &message(1, 1, "late")).await.unwrap();
        let result = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(result, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn closed_broker_rejects_publish_and_subscribe() {
        let broker = InMemoryBroker::default();
        let (handler, _rx) = collecting_handler();
        broker.subscribe("chat.1", Arc::clone(&handler)).await.unwrap();

        broker.close().await.unwrap();
        assert!(broker.is_closed());
        assert_eq!(broker.subscription_count(), 0);

        let err = broker.publish(&Topic::for_chat(1), &message(1, 1, "x")).await.unwrap_err();
        assert!(matches!(err, BrokerError::Closed));
        let err = broker.subscribe("chat.1", handler).await.unwrap_err();
        assert!(matches!(err, BrokerError::Closed));
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected() {
        let broker = InMemoryBroker::default();
        let (handler, _rx) = collecting_handler();
        let err = broker.subscribe("chat.>.x", handler).await.unwrap_err();
        assert!(matches!(err, BrokerError::InvalidTopic(_)));
    }

    #[test]
    fn from_url_accepts_memory_scheme_only() {
        assert!(InMemoryBroker::from_url("memory://", 8).is_ok());
        assert!(matches!(
            InMemoryBroker::from_url("nats://localhost:4222", 8),
            Err(BrokerError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn debug_impl() {
        let broker = InMemoryBroker::default();
        let debug = format!("{broker:?}");
        assert!(debug.contains("InMemoryBroker"));
        assert!(debug.contains("subscriptions"));
    }
}
