//! Shared domain types for relaychat.
//!
//! This crate contains the core domain types used across the workspace:
//! chat messages, topics, sagas, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod message;
pub mod saga;
pub mod topic;
