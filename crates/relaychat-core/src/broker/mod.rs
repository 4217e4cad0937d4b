//! Topic-addressed publish/subscribe.
//!
//! - `codec` -- JSON wire encoding of a `ChatMessage` on a topic
//! - `memory` -- `InMemoryBroker`, the in-process broker implementation
//!
//! Delivery is at-most-once per subscriber: a subscriber that cannot keep up
//! loses messages instead of blocking the publisher. Within one topic,
//! delivery order equals publish order.

pub mod codec;
pub mod memory;

use std::future::Future;
use std::sync::Arc;

use relaychat_types::error::BrokerError;
use relaychat_types::message::ChatMessage;
use relaychat_types::topic::Topic;
use uuid::Uuid;

pub use memory::InMemoryBroker;

/// Callback invoked for every message delivered to a subscription.
///
/// Handlers run on the subscription's worker task and must not block; the
/// expected body is a non-blocking enqueue into a bounded channel.
pub type MessageHandler = Arc<dyn Fn(ChatMessage) + Send + Sync>;

/// Handle to an active subscription, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: Uuid,
    pattern: String,
}

impl Subscription {
    pub(crate) fn new(pattern: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            pattern: pattern.to_string(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Publish/subscribe broker.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait Broker: Send + Sync + 'static {
    /// Publish `message` on `topic`.
    ///
    /// Returns once the message has been handed to every matching
    /// subscriber queue. Never waits for slow subscribers.
    fn publish(
        &self,
        topic: &Topic,
        message: &ChatMessage,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Register `handler` for every topic matching `pattern`.
    fn subscribe(
        &self,
        pattern: &str,
        handler: MessageHandler,
    ) -> impl Future<Output = Result<Subscription, BrokerError>> + Send;

    /// Stop delivering to `subscription`. Unknown subscriptions are ignored.
    fn unsubscribe(
        &self,
        subscription: &Subscription,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Drop all subscriptions and reject further publishes.
    fn close(&self) -> impl Future<Output = Result<(), BrokerError>> + Send;
}
