//! Send-and-notify saga.
//!
//! - `orchestrator` -- `SagaOrchestrator`: persist, notify, compensate
//! - `log` -- in-memory record of saga state, queryable by id
//! - `retry` -- bounded per-recipient retry policy

pub mod log;
pub mod orchestrator;
pub mod retry;

pub use log::SagaLog;
pub use orchestrator::{SagaFailure, SagaOrchestrator};
pub use retry::RetryPolicy;
