//! Scan cycle orchestration
//!
//! One cycle: check the account, check the position cap, screen the
//! universe, rank breakouts by strength, then size and dispatch the first
//! candidate that can be afforded. At most one order leaves per cycle.

use anyhow::Result;
use rust_decimal::prelude::ToPrimitive;
use std::fmt;
use tracing::{info, warn};

use crate::broker::{Broker, OrderAck};
use crate::config::ScanConfig;
use crate::orders::{dispatch, BracketOrder, Dispatch};
use crate::risk::{position_size, risk_amount};
use crate::screener::BreakoutScreener;
use crate::types::{Account, Candidate};

/// How a cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Account could not be fetched
    AccountUnavailable,
    TradingBlocked,
    /// Open positions could not be fetched
    PositionsUnavailable,
    /// Position cap reached; nothing was screened
    AtCapacity { open: usize, cap: usize },
    NoCandidates,
    /// Breakouts found, none affordable
    AllSizedToZero { candidates: usize },
    DryRun { order: BracketOrder },
    Submitted { order: BracketOrder, ack: OrderAck },
    OrderFailed { order: BracketOrder, reason: String },
}

impl CycleOutcome {
    /// An order went out or would have in dry-run mode
    pub fn traded(&self) -> bool {
        matches!(
            self,
            CycleOutcome::DryRun { .. } | CycleOutcome::Submitted { .. }
        )
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::AccountUnavailable => write!(f, "account unavailable"),
            CycleOutcome::TradingBlocked => write!(f, "trading blocked"),
            CycleOutcome::PositionsUnavailable => write!(f, "positions unavailable"),
            CycleOutcome::AtCapacity { open, cap } => {
                write!(f, "at capacity ({} open, limit {})", open, cap)
            }
            CycleOutcome::NoCandidates => write!(f, "no breakouts"),
            CycleOutcome::AllSizedToZero { candidates } => {
                write!(f, "{} breakouts, none affordable", candidates)
            }
            CycleOutcome::DryRun { order } => {
                write!(f, "dry run {} qty={}", order.symbol, order.qty)
            }
            CycleOutcome::Submitted { order, ack } => write!(
                f,
                "submitted {} qty={} (id={}, status={})",
                order.symbol, order.qty, ack.id, ack.status
            ),
            CycleOutcome::OrderFailed { order, reason } => {
                write!(f, "order for {} failed: {}", order.symbol, reason)
            }
        }
    }
}

/// Stable sort, strongest breakout first
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.strength.total_cmp(&a.strength));
}

/// Runs decision cycles against a broker
pub struct Scanner<B: Broker> {
    broker: B,
    config: ScanConfig,
    screener: BreakoutScreener,
}

impl<B: Broker> Scanner<B> {
    pub fn new(broker: B, config: ScanConfig) -> Self {
        let screener = BreakoutScreener::new(&config);
        Self {
            broker,
            config,
            screener,
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run one decision cycle.
    ///
    /// Missing broker data ends the cycle with an outcome; an `Err` means the
    /// broker answered with something unusable, such as a malformed balance.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let account = match self.broker.account().await {
            Ok(info) => Account::try_from(info)?,
            Err(e) => {
                warn!("Cannot fetch account: {}", e);
                return Ok(CycleOutcome::AccountUnavailable);
            }
        };
        if account.trading_blocked {
            warn!("Trading is blocked on this account");
            return Ok(CycleOutcome::TradingBlocked);
        }
        info!(
            "Account OK | Buying Power ${:.2} | Equity ${:.2}",
            account.buying_power, account.equity
        );

        let open = match self.broker.positions().await {
            Ok(positions) => positions.len(),
            Err(e) => {
                warn!("Cannot fetch positions: {}", e);
                return Ok(CycleOutcome::PositionsUnavailable);
            }
        };
        let cap = self.config.max_concurrent_positions;
        if open >= cap {
            info!(
                "Holding {} (limit {}). Skipping new entries this cycle.",
                open, cap
            );
            return Ok(CycleOutcome::AtCapacity { open, cap });
        }

        let mut candidates = Vec::new();
        for symbol in self.config.scan_symbols() {
            if let Some(candidate) = self.screener.evaluate(&self.broker, symbol).await {
                candidates.push(candidate);
            }
        }

        if candidates.is_empty() {
            info!("No valid breakouts this cycle");
            return Ok(CycleOutcome::NoCandidates);
        }

        rank(&mut candidates);
        info!("{} breakout candidates", candidates.len());

        let buying_power = account.buying_power.to_f64().unwrap_or(0.0);
        for candidate in &candidates {
            let qty = position_size(
                buying_power,
                candidate.entry,
                candidate.stop,
                self.config.risk_pct_per_trade,
            );
            if qty == 0 {
                warn!("{}: size=0 (insufficient buying power)", candidate.symbol);
                continue;
            }

            let order =
                match BracketOrder::from_candidate(candidate, qty, &self.config.time_in_force) {
                    Ok(order) => order,
                    Err(e) => {
                        warn!("Skipping {}", e);
                        continue;
                    }
                };

            info!(
                "{} | entry~{:.2} stop={:.2} take={:.2} qty={} risk=${:.2}",
                order.symbol,
                candidate.entry,
                order.stop_price,
                order.take_profit_price,
                qty,
                risk_amount(
                    qty,
                    candidate.entry,
                    order.stop_price.to_f64().unwrap_or(candidate.stop)
                )
            );

            // One submission attempt per cycle, whatever its result
            let outcome = match dispatch(&self.broker, &order, self.config.dry_run).await {
                Dispatch::Simulated => CycleOutcome::DryRun { order },
                Dispatch::Accepted(ack) => CycleOutcome::Submitted { order, ack },
                Dispatch::Failed(e) => CycleOutcome::OrderFailed {
                    order,
                    reason: e.to_string(),
                },
            };
            return Ok(outcome);
        }

        Ok(CycleOutcome::AllSizedToZero {
            candidates: candidates.len(),
        })
    }
}
