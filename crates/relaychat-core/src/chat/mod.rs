//! Chat persistence abstractions and message ingestion.
//!
//! - `repository` -- the `ChatRepository` trait the infra layer implements
//! - `preview` -- the `LinkPreviewer` port used to enrich single-link messages
//! - `service` -- `ChatService`: validate, enrich, persist, publish

pub mod preview;
pub mod repository;
pub mod service;

pub use preview::{DisabledPreviewer, LinkPreviewer, PreviewError};
pub use repository::ChatRepository;
pub use service::ChatService;
