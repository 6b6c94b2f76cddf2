//! Status command - clock, account and open positions

use anyhow::{Context, Result};

use breakout_scanner::broker::Broker;
use breakout_scanner::{Account, Config};

pub fn run(config_path: String) -> Result<()> {
    let config = super::load_config(&config_path, false, None)?;

    super::runtime()?.block_on(status_async(config))
}

async fn status_async(config: Config) -> Result<()> {
    let client = super::connect(&config)?;

    let clock = client.clock().await.context("Failed to fetch clock")?;
    let account = client.account().await.context("Failed to fetch account")?;
    let account = Account::try_from(account)?;
    let positions = client
        .positions()
        .await
        .context("Failed to fetch positions")?;

    println!("\n{}", "=".repeat(60));
    println!("ACCOUNT STATUS");
    println!("{}", "=".repeat(60));
    println!("Market open:      {}", clock.is_open);
    if let Some(next_open) = clock.next_open {
        println!("Next open:        {}", next_open);
    }
    if let Some(next_close) = clock.next_close {
        println!("Next close:       {}", next_close);
    }
    println!("Buying power:     ${:.2}", account.buying_power);
    println!("Equity:           ${:.2}", account.equity);
    println!("Trading blocked:  {}", account.trading_blocked);
    println!(
        "Open positions:   {} (limit {})",
        positions.len(),
        config.scan.max_concurrent_positions
    );
    for position in &positions {
        println!("  {:<8} qty={}", position.symbol, position.qty);
    }
    println!("{}", "=".repeat(60));

    Ok(())
}
