//! Market-hours gated scan loop
//!
//! [`Scheduler::tick`] is one pass: consult the exchange clock and run a
//! cycle if the market is open. [`Scheduler::run_until`] repeats ticks with
//! the configured spacing until its shutdown future completes. Shutdown is
//! only observed while sleeping between ticks, so a cycle that has started
//! always finishes.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::scanner::{CycleOutcome, Scanner};

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    MarketClosed,
    Cycle(CycleOutcome),
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    /// Ticks that ran a scan cycle
    pub cycles: u64,
    /// Ticks that ended in an error
    pub failures: u64,
}

pub struct Scheduler<B: Broker> {
    scanner: Scanner<B>,
    interval: Duration,
    recovery_pause: Duration,
}

impl<B: Broker> Scheduler<B> {
    pub fn new(scanner: Scanner<B>) -> Self {
        let interval = scanner.config().scan_interval();
        let recovery_pause = scanner.config().recovery_pause();
        Self {
            scanner,
            interval,
            recovery_pause,
        }
    }

    /// Delay between successful ticks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Delay after a failed tick
    pub fn with_recovery_pause(mut self, pause: Duration) -> Self {
        self.recovery_pause = pause;
        self
    }

    pub fn scanner(&self) -> &Scanner<B> {
        &self.scanner
    }

    /// One pass. An unreadable clock counts as a closed market.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let is_open = match self.scanner.broker().clock().await {
            Ok(clock) => clock.is_open,
            Err(e) => {
                warn!("Cannot fetch market clock: {}", e);
                false
            }
        };

        if !is_open {
            info!("Market closed. (Market orders may reject after-hours.)");
            return Ok(TickOutcome::MarketClosed);
        }

        let outcome = self.scanner.run_cycle().await?;
        info!("Cycle complete: {}", outcome);
        Ok(TickOutcome::Cycle(outcome))
    }

    /// Tick until `shutdown` resolves. Failed ticks are logged and followed
    /// by the recovery pause instead of the scan interval.
    pub async fn run_until<F>(&self, shutdown: F) -> TickStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = TickStats::default();

        loop {
            stats.ticks += 1;
            let pause = match self.tick().await {
                Ok(TickOutcome::Cycle(_)) => {
                    stats.cycles += 1;
                    self.interval
                }
                Ok(TickOutcome::MarketClosed) => self.interval,
                Err(e) => {
                    stats.failures += 1;
                    error!("Loop error: {:#}", e);
                    self.recovery_pause
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(pause) => {}
            }
        }

        info!(
            "Scheduler stopped after {} ticks ({} cycles, {} failures)",
            stats.ticks, stats.cycles, stats.failures
        );
        stats
    }
}
