//! CLI command definitions for the `relaychat` binary.
//!
//! Uses clap derive macros for argument parsing. `serve` runs the server;
//! every other command is a client of a running server.

pub mod chat;
pub mod client;

use clap::{Parser, Subcommand};

/// Chat message distribution: ingestion, live streams, and email notifications.
#[derive(Parser)]
#[command(name = "relaychat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "RELAYCHAT_LOG_JSON")]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "RELAYCHAT_OTEL")]
    pub otel: bool,

    /// Address of the server that client commands talk to.
    #[arg(long, global = true, env = "RELAYCHAT_SERVER", default_value = client::DEFAULT_SERVER)]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP/WebSocket API server and the email notifier.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000", env = "RELAYCHAT_PORT")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1", env = "RELAYCHAT_HOST")]
        host: String,
    },

    /// Send a message to a chat.
    Send {
        /// Chat id.
        chat: i64,

        /// Sender name or address.
        sender: String,

        /// Message text. A lone link is replaced by its preview.
        text: String,
    },

    /// Print the stored messages of a chat, oldest first.
    History {
        /// Chat id.
        chat: i64,
    },

    /// Print a chat's history, then follow its live messages.
    Connect {
        /// Chat id.
        chat: i64,
    },

    /// Create a chat with the given member email addresses.
    CreateChat {
        /// Member addresses, in notification order.
        #[arg(required = true)]
        members: Vec<String>,
    },
}
