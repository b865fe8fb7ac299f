//! # Dealroom OAuth Connector Entry Point

use std::sync::Arc;

use clap::{Parser, Subcommand};
use dealroom_oauth::{
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    server::run_server,
    telemetry::init_tracing,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "dealroom-oauth", version, about = "Dealroom OAuth connector service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Apply pending migrations before serving
        #[arg(long)]
        migrate: bool,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(configuration = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;

    match cli.command.unwrap_or(Command::Serve { migrate: false }) {
        Command::Migrate => run_migrations(&db).await,
        Command::Serve { migrate } => {
            if migrate {
                run_migrations(&db).await?;
            }

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Shutdown requested");
                        signal.cancel();
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to listen for shutdown signal");
                    }
                }
            });

            run_server(Arc::new(config), db, shutdown).await
        }
    }
}
