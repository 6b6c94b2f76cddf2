//! CLI subcommands

pub mod once;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use tracing::info;

use breakout_scanner::broker::AlpacaClient;
use breakout_scanner::Config;

/// Load the config file, apply command-line overrides, then validate
fn load_config(config_path: &str, dry_run: bool, interval: Option<u64>) -> Result<Config> {
    dotenv::dotenv().ok();

    let mut config = Config::load(config_path)
        .context(format!("Failed to load config from {}", config_path))?;

    if dry_run {
        config.scan.dry_run = true;
    }
    if let Some(secs) = interval {
        config.scan.scan_interval_secs = secs;
    }
    config.validate()?;

    Ok(config)
}

fn connect(config: &Config) -> Result<AlpacaClient> {
    let credentials = config.broker.credentials()?;
    let client = AlpacaClient::with_config(credentials, config.broker.client_config())
        .context("Failed to build broker client")?;
    info!("Trading endpoint: {}", config.broker.trading_base_url);
    Ok(client)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}
