//! CLI entry point.

use anyhow::Result;
use clap::Parser;
use deployd_axum::{ServerConfig, start_server};
use deployd_cli::Cli;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before clap reads DEPLOYD_*
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = cli.settings()?;
    let mut config = ServerConfig::new(settings);
    if !cli.allow_origins.is_empty() {
        config = config.with_allowed_origins(cli.allow_origins.clone());
    }

    start_server(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl-C");
    })
    .await
}
