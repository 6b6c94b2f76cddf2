//! Bracket order construction and dispatch

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};

use crate::broker::{Broker, BrokerError, OrderAck};
use crate::types::Candidate;

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("{symbol}: bracket prices out of order (stop={stop:.2}, entry={entry:.2}, take={take:.2})")]
    InvalidBracket {
        symbol: String,
        stop: f64,
        entry: f64,
        take: f64,
    },

    #[error("{0}: quantity must be positive")]
    ZeroQuantity(String),
}

/// Market entry with an attached stop-loss and take-profit leg
#[derive(Debug, Clone, PartialEq)]
pub struct BracketOrder {
    pub symbol: String,
    pub qty: u64,
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
    pub time_in_force: String,
}

/// Round a price to whole cents.
///
/// Works on the exact binary value of `price`, so 1.115 (stored as
/// 1.11499999...) rounds to 1.11. Exact half-cent ties go to the even cent.
/// `None` for NaN and infinities.
pub fn round_cents(price: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(price).map(|d| d.round_dp(2))
}

impl BracketOrder {
    /// Build an order for `candidate`, refusing anything that would violate
    /// `stop < entry < take` once prices are rounded to cents.
    pub fn from_candidate(
        candidate: &Candidate,
        qty: u64,
        time_in_force: &str,
    ) -> Result<Self, OrderError> {
        if qty == 0 {
            return Err(OrderError::ZeroQuantity(candidate.symbol.clone()));
        }

        let invalid = || OrderError::InvalidBracket {
            symbol: candidate.symbol.clone(),
            stop: candidate.stop,
            entry: candidate.entry,
            take: candidate.take,
        };
        if !candidate.has_valid_bracket() {
            return Err(invalid());
        }

        let entry = Decimal::from_f64_retain(candidate.entry).ok_or_else(invalid)?;
        let stop_price = round_cents(candidate.stop).ok_or_else(invalid)?;
        let take_profit_price = round_cents(candidate.take).ok_or_else(invalid)?;
        if !(stop_price < entry && entry < take_profit_price) {
            return Err(invalid());
        }

        Ok(BracketOrder {
            symbol: candidate.symbol.to_uppercase(),
            qty,
            stop_price,
            take_profit_price,
            time_in_force: time_in_force.to_string(),
        })
    }
}

/// What happened to an order handed to [`dispatch`]
#[derive(Debug)]
pub enum Dispatch {
    /// Dry run: the order was logged, not sent
    Simulated,
    Accepted(OrderAck),
    Failed(BrokerError),
}

/// Submit `order` through `broker`, or only log it when `dry_run` is set.
pub async fn dispatch<B: Broker>(broker: &B, order: &BracketOrder, dry_run: bool) -> Dispatch {
    if dry_run {
        info!(
            "[DRY RUN] Not sending order: {} qty={} SL={:.2} TP={:.2}",
            order.symbol, order.qty, order.stop_price, order.take_profit_price
        );
        return Dispatch::Simulated;
    }

    match broker.place_bracket_order(order).await {
        Ok(ack) => {
            info!(
                "Order accepted: {} qty={} | id={} status={}",
                order.symbol, order.qty, ack.id, ack.status
            );
            Dispatch::Accepted(ack)
        }
        Err(e) => {
            error!("Failed to place bracket order for {}: {}", order.symbol, e);
            Dispatch::Failed(e)
        }
    }
}
