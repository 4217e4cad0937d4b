//! Infrastructure layer for relaychat.
//!
//! Contains implementations of the traits defined in `relaychat-core`:
//! SQLite storage and recipient lookup, the email relay client, the
//! OpenGraph link previewer, and the configuration loader.

pub mod config;
pub mod email;
pub mod preview;
pub mod sqlite;
