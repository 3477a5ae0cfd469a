mod analysis;
mod clickhouse;
mod cli;
mod config;
mod signal;
mod tracker;
mod watch;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::TripwireConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch => {
            let config = TripwireConfig::load_or_default(&cli.config)?;
            watch::run(config).await
        }
        Commands::Tracker => {
            let config = TripwireConfig::load_or_default(&cli.config)?;
            info!("Starting tripwire tracker v{}", env!("CARGO_PKG_VERSION"));
            tracker::serve(&config, signal::shutdown_signal()).await
        }
        Commands::Doctor => {
            let config = TripwireConfig::load_or_default(&cli.config)?;
            cli::doctor::run(config).await
        }
        Commands::Config(cmd) => cli::config_cmd::run(cmd, &cli.config),
    }
}
