//! Run command
//!
//! Long-running scan loop:
//! - Startup banner with the active parameters and market clock
//! - Market-hours gated cycles every scan interval
//! - Ctrl+C stops the loop between ticks

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use breakout_scanner::broker::Broker;
use breakout_scanner::scanner::Scanner;
use breakout_scanner::scheduler::Scheduler;
use breakout_scanner::Config;

pub fn run(config_path: String, dry_run: bool, interval: Option<u64>) -> Result<()> {
    let config = super::load_config(&config_path, dry_run, interval)?;
    super::runtime()?.block_on(run_async(config))
}

async fn run_async(config: Config) -> Result<()> {
    let client = super::connect(&config)?;
    let scan = &config.scan;

    info!("============================================================");
    info!("  BREAKOUT SCANNER");
    info!("------------------------------------------------------------");
    info!(
        "  timeframe {} | scan {}s | risk {:.2}%/trade",
        scan.timeframe,
        scan.scan_interval_secs,
        scan.risk_pct_per_trade * 100.0
    );
    info!(
        "  stops {}x ATR | targets {}x ATR | DRY_RUN={}",
        scan.stop_atr_mult, scan.take_profit_atr_mult, scan.dry_run
    );
    info!(
        "  universe {} symbols, {} per scan | max {} positions",
        scan.universe.len(),
        scan.scan_symbols().len(),
        scan.max_concurrent_positions
    );
    info!("============================================================");

    match client.clock().await {
        Ok(clock) => info!(
            "Market open: {} | next open: {} | next close: {}",
            clock.is_open,
            clock
                .next_open
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            clock
                .next_close
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        ),
        Err(e) => warn!("Cannot fetch market clock: {}", e),
    }

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                error!("Error setting up signal handler: {}", e);
                // Parked forever; the sender stays alive and the loop keeps running
                std::future::pending::<()>().await;
            }
        }
    });

    let scheduler = Scheduler::new(Scanner::new(client, config.scan));

    info!("Starting scan loop...");
    let stats = scheduler
        .run_until(async move {
            shutdown_rx.recv().await;
        })
        .await;

    info!("Stopped by user");
    info!(
        "Session: {} ticks, {} cycles, {} failures",
        stats.ticks, stats.cycles, stats.failures
    );
    Ok(())
}
