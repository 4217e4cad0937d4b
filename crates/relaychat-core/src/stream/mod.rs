//! Live delivery of chat messages to connected consumers.
//!
//! - `registry` -- one bounded channel and one broker subscription per chat
//! - `sink` -- the `MessageSink` trait a consumer connection implements
//! - `dispatcher` -- history-then-live delivery for one connection

pub mod dispatcher;
pub mod registry;
pub mod sink;

pub use dispatcher::{DispatchEnd, DispatchError, DispatchSummary, StreamDispatcher};
pub use registry::{ChatChannel, ChatFeed, SubscriptionRegistry};
pub use sink::{MessageSink, SinkError};
