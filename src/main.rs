//! Stockrag CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use stockrag::cli::{self, Cli};
use stockrag::infrastructure::logging::{LogConfig, LoggerImpl};
use stockrag::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        cli::handle_error(&err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };

    let log_config = LogConfig::try_from(&config.logging)?;
    let _logger = LoggerImpl::init(&log_config).context("Failed to initialize logging")?;

    cli::commands::execute(cli.command, &config, cli.json).await
}
