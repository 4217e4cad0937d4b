//! Observability setup for relaychat: structured logging via `tracing` and
//! optional OpenTelemetry span export.

pub mod tracing_setup;

pub use tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
