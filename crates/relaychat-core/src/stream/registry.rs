//! Per-chat subscription registry.
//!
//! The registry maps a chat id to a [`ChatChannel`]. The first request for a
//! chat creates the channel and binds exactly one broker subscription to
//! `chat.<id>`; every later consumer of that chat shares it.
//!
//! Inside a channel, the broker handler does a non-blocking `try_send` into
//! a bounded ingress queue. When the queue is full the message is dropped
//! and logged so a stalled chat can never block the broker. A pump task
//! drains the ingress queue into a `broadcast` fan-out, from which every
//! attached [`ChatFeed`] receives its own copy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use relaychat_types::error::BrokerError;
use relaychat_types::message::ChatMessage;
use relaychat_types::topic::Topic;
use tokio::sync::{OnceCell, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::{Broker, MessageHandler, Subscription};

/// Default capacity of a chat's delivery channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Delivery channel of one chat.
pub struct ChatChannel {
    chat_id: i64,
    ingress: mpsc::Sender<ChatMessage>,
    fanout: broadcast::Sender<ChatMessage>,
    subscription: OnceCell<Subscription>,
    pump: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

impl ChatChannel {
    fn new(chat_id: i64, capacity: usize) -> Self {
        let (ingress, mut rx) = mpsc::channel::<ChatMessage>(capacity);
        let (fanout, _) = broadcast::channel(capacity);

        let pump_fanout = fanout.clone();
        let pump = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if pump_fanout.send(message).is_err() {
                    debug!(chat_id, "no consumers attached, message not fanned out");
                }
            }
            debug!(chat_id, "chat pump stopped");
        });

        Self {
            chat_id,
            ingress,
            fanout,
            subscription: OnceCell::new(),
            pump,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// Messages dropped because the ingress queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of feeds currently attached.
    pub fn consumer_count(&self) -> usize {
        self.fanout.receiver_count()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.initialized()
    }

    /// A new receiver that sees every message fanned out from now on.
    pub fn feed(&self) -> ChatFeed {
        ChatFeed {
            chat_id: self.chat_id,
            rx: self.fanout.subscribe(),
        }
    }

    /// Broker handler that enqueues into this channel without blocking.
    fn handler(&self) -> MessageHandler {
        let chat_id = self.chat_id;
        let ingress = self.ingress.clone();
        let dropped = Arc::clone(&self.dropped);
        Arc::new(move |message: ChatMessage| match ingress.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                warn!(chat_id, message_id = message.id, "chat channel full, message dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(chat_id, "chat channel closed");
            }
        })
    }
}

impl std::fmt::Debug for ChatChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatChannel")
            .field("chat_id", &self.chat_id)
            .field("consumers", &self.consumer_count())
            .field("subscribed", &self.is_subscribed())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl Drop for ChatChannel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Receiving end of a chat channel held by one consumer.
pub struct ChatFeed {
    chat_id: i64,
    rx: broadcast::Receiver<ChatMessage>,
}

impl ChatFeed {
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// Next message, or `None` once the channel is torn down.
    ///
    /// A consumer that falls behind skips the oldest messages it missed.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(chat_id = self.chat_id, skipped, "consumer lagging, messages skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Shared chat id to channel mapping.
///
/// The map lock is held only for lookup-or-insert and never across an await.
pub struct SubscriptionRegistry<B: Broker> {
    broker: Arc<B>,
    capacity: usize,
    channels: Mutex<HashMap<i64, Arc<ChatChannel>>>,
}

impl<B: Broker> SubscriptionRegistry<B> {
    pub fn new(broker: Arc<B>, capacity: usize) -> Self {
        Self {
            broker,
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of chats with a channel.
    pub fn chat_count(&self) -> usize {
        self.lock().len()
    }

    pub fn get(&self, chat_id: i64) -> Option<Arc<ChatChannel>> {
        self.lock().get(&chat_id).cloned()
    }

    /// Return the chat's channel, creating it and its broker subscription
    /// on first use.
    ///
    /// Concurrent callers for the same chat share a single subscription
    /// attempt. If subscribing fails, the error is returned and the next
    /// caller tries again.
    pub async fn get_or_create(&self, chat_id: i64) -> Result<Arc<ChatChannel>, BrokerError> {
        let channel = {
            let mut channels = self.lock();
            Arc::clone(
                channels
                    .entry(chat_id)
                    .or_insert_with(|| Arc::new(ChatChannel::new(chat_id, self.capacity))),
            )
        };

        channel
            .subscription
            .get_or_try_init(|| async {
                let topic = Topic::for_chat(chat_id);
                let subscription = self
                    .broker
                    .subscribe(topic.as_str(), channel.handler())
                    .await?;
                info!(chat_id, %topic, "chat channel subscribed");
                Ok::<_, BrokerError>(subscription)
            })
            .await?;

        Ok(channel)
    }

    /// Attach a new consumer feed to the chat.
    pub async fn attach(&self, chat_id: i64) -> Result<ChatFeed, BrokerError> {
        let channel = self.get_or_create(chat_id).await?;
        Ok(channel.feed())
    }

    /// Remove the chat's channel and release its broker subscription.
    ///
    /// Attached feeds observe the end of the stream. Returns `false` if the
    /// chat had no channel.
    pub async fn teardown(&self, chat_id: i64) -> Result<bool, BrokerError> {
        let removed = self.lock().remove(&chat_id);
        let Some(channel) = removed else {
            return Ok(false);
        };
        if let Some(subscription) = channel.subscription.get() {
            self.broker.unsubscribe(subscription).await?;
        }
        channel.pump.abort();
        info!(chat_id, "chat channel torn down");
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<ChatChannel>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::test_support::message;
    use std::time::Duration;

    fn registry(capacity: usize) -> (Arc<SubscriptionRegistry<InMemoryBroker>>, Arc<InMemoryBroker>) {
        let broker = Arc::new(InMemoryBroker::default());
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&broker), capacity));
        (registry, broker)
    }

    async fn next(feed: &mut ChatFeed) -> ChatMessage {
        tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .expect("timed out")
            .expect("feed closed")
    }

    #[tokio::test]
    async fn get_or_create_subscribes_once() {
        let (registry, broker) = registry(10);
        let first = registry.get_or_create(1).await.unwrap();
        let second = registry.get_or_create(1).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_subscribed());
        assert_eq!(registry.chat_count(), 1);
        assert_eq!(broker.subscription_count_for("chat.1"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_attachments_share_one_subscription() {
        let (registry, broker) = registry(10);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.attach(7).await.unwrap() }));
        }
        let mut feeds = Vec::new();
        for handle in handles {
            feeds.push(handle.await.unwrap());
        }

        assert_eq!(broker.subscription_count_for("chat.7"), 1);
        assert_eq!(registry.get(7).unwrap().consumer_count(), 16);
    }

    #[tokio::test]
    async fn every_feed_receives_every_message() {
        let (registry, broker) = registry(10);
        let mut a = registry.attach(1).await.unwrap();
        let mut b = registry.attach(1).await.unwrap();

        broker.publish(&Topic::for_chat(1), &message(1, 1, "x")).await.unwrap();
        broker.publish(&Topic::for_chat(1), &message(2, 1, "y")).await.unwrap();

        assert_eq!(next(&mut a).await.id, 1);
        assert_eq!(next(&mut a).await.id, 2);
        assert_eq!(next(&mut b).await.id, 1);
        assert_eq!(next(&mut b).await.id, 2);
    }

    #[tokio::test]
    async fn chats_are_isolated() {
        let (registry, broker) = registry(10);
        let mut only_two = registry.attach(2).await.unwrap();
        registry.attach(1).await.unwrap();

        broker.publish(&Topic::for_chat(1), &message(1, 1, "c1")).await.unwrap();
        broker.publish(&Topic::for_chat(2), &message(2, 2, "c2")).await.unwrap();

        let received = next(&mut only_two).await;
        assert_eq!(received.chat_id, 2);
        let extra = tokio::time::timeout(Duration::from_millis(30), only_two.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn publishing_into_saturated_chat_never_blocks() {
        let (registry, broker) = registry(1);
        let _feed = registry.attach(1).await.unwrap();

        let publish_many = async {
            for i in 1..=100 {
                broker.publish(&Topic::for_chat(1), &message(i, 1, "x")).await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(1), publish_many)
            .await
            .expect("publisher blocked");
    }

    #[tokio::test]
    async fn teardown_unsubscribes_and_closes_feeds() {
        let (registry, broker) = registry(10);
        let mut feed = registry.attach(3).await.unwrap();

        assert!(registry.teardown(3).await.unwrap());
        assert_eq!(registry.chat_count(), 0);
        assert_eq!(broker.subscription_count(), 0);

        let end = tokio::time::timeout(Duration::from_secs(1), feed.recv()).await.unwrap();
        assert!(end.is_none());
        assert!(!registry.teardown(3).await.unwrap());
    }

    #[tokio::test]
    async fn failed_subscribe_is_retried_by_next_caller() {
        let (registry, broker) = registry(10);
        broker.close().await.unwrap();

        let err = registry.get_or_create(4).await.unwrap_err();
        assert!(matches!(err, BrokerError::Closed));
        assert!(!registry.get(4).unwrap().is_subscribed());
    }

    #[tokio::test]
    async fn channel_debug_shows_state() {
        let (registry, _broker) = registry(10);
        let _feed = registry.attach(6).await.unwrap();
        let channel = registry.get(6).unwrap();

        let debug = format!("{channel:?}");
        assert!(debug.contains("chat_id: 6"));
        assert!(debug.contains("consumers: 1"));
        assert!(debug.contains("subscribed: true"));
    }
}
