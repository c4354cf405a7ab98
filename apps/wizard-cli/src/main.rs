//! reportflow command-line entry point.

mod cli;
mod commands;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::WizardConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reportflow=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    let mut config = match WizardConfig::load_from(&config_path) {
        Ok(c) => {
            tracing::debug!(path = %config_path.display(), "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            WizardConfig::default()
        }
    };
    if let Some(api) = cli.api {
        config.api_base_url = api;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        api = %config.api_base_url,
        "starting reportflow"
    );

    match cli.command {
        Command::Run(args) => commands::run(&config, args).await,
        Command::Watch { session_id } => commands::watch(&config, &session_id).await,
        Command::Config => commands::show_config(&config, &config_path),
    }
}
