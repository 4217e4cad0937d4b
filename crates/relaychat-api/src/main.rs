//! relaychat CLI and API entry point.
//!
//! Binary name: `relaychat`
//!
//! Parses CLI arguments and initializes tracing. `serve` opens the database,
//! wires the services, and starts the API server; the other commands call a
//! running server over HTTP.

mod cli;
mod http;
mod state;
#[cfg(test)]
mod test_support;

use clap::Parser;
use relaychat_core::broker::Broker;
use relaychat_observe::tracing_setup::filter_for_verbosity;
use relaychat_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::client::ApiClient;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions::new(filter_for_verbosity(cli.verbose, cli.quiet))
        .json(cli.log_json)
        .otel(cli.otel);
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::CreateChat { members } => {
            let client = ApiClient::new(&cli.server)?;
            cli::chat::create_chat(&client, &members, cli.json).await?;
        }

        Commands::Send { chat, sender, text } => {
            let client = ApiClient::new(&cli.server)?;
            cli::chat::send_message(&client, chat, &sender, &text, cli.json).await?;
        }

        Commands::History { chat } => {
            let client = ApiClient::new(&cli.server)?;
            cli::chat::history(&client, chat, cli.json).await?;
        }

        Commands::Connect { chat } => {
            let client = ApiClient::new(&cli.server)?;
            cli::chat::connect(&client, chat, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let state = AppState::init().await?;
            let notifier = state.start_notifier().await?;

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} relaychat listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());
            tracing::info!(%addr, data_dir = %state.data_dir.display(), "server started");

            let app = http::router::build_router(state.clone());
            let shutdown = state.shutdown.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    // Ends every open chat stream so connections can drain.
                    shutdown.cancel();
                })
                .await?;

            if let Err(e) = notifier.stop().await {
                tracing::warn!(error = %e, "failed to stop notifier");
            }
            state.broker.close().await?;

            println!("\n  Server stopped.");
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
