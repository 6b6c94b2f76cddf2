//! Single tick, for smoke-testing credentials and configuration

use anyhow::Result;
use tracing::info;

use breakout_scanner::scanner::Scanner;
use breakout_scanner::scheduler::{Scheduler, TickOutcome};
use breakout_scanner::Config;

pub fn run(config_path: String, dry_run: bool) -> Result<()> {
    let config = super::load_config(&config_path, dry_run, None)?;

    super::runtime()?.block_on(once_async(config))
}

async fn once_async(config: Config) -> Result<()> {
    let client = super::connect(&config)?;
    let scheduler = Scheduler::new(Scanner::new(client, config.scan));

    match scheduler.tick().await? {
        TickOutcome::MarketClosed => println!("Market closed, no cycle run"),
        TickOutcome::Cycle(outcome) => {
            info!("Single tick finished");
            println!("Cycle outcome: {}", outcome);
        }
    }
    Ok(())
}
