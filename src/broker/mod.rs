//! Brokerage integration
//!
//! The scanner talks to the brokerage only through the [`Broker`] trait:
//! five idempotent reads and one write. [`AlpacaClient`] is the production
//! implementation; tests substitute an in-memory broker.
//!
//! Every method returns a [`BrokerResult`]. Callers in the decision engine
//! treat any `Err` as "no actionable data" for the symbol or cycle at hand.

pub mod alpaca;
pub mod error;
pub mod retry;
pub mod types;

pub use alpaca::{AlpacaClient, Credentials};
pub use error::{BrokerError, BrokerResult};
pub use retry::RetryPolicy;
pub use types::{AccountInfo, ClockInfo, OrderAck, PositionInfo};

use crate::orders::BracketOrder;
use crate::types::{Bar, Clock, Snapshot};

/// Brokerage operations the scanner depends on
#[allow(async_fn_in_trait)]
pub trait Broker {
    /// Exchange open/closed state
    async fn clock(&self) -> BrokerResult<Clock>;

    /// Account state; amounts are parsed by the caller
    async fn account(&self) -> BrokerResult<AccountInfo>;

    /// Currently open positions
    async fn positions(&self) -> BrokerResult<Vec<PositionInfo>>;

    /// Most recent `limit` bars, oldest first
    async fn bars(&self, symbol: &str, timeframe: &str, limit: usize) -> BrokerResult<Vec<Bar>>;

    /// Trading-status snapshot
    async fn snapshot(&self, symbol: &str) -> BrokerResult<Snapshot>;

    /// Submit a bracket order. Called at most once per cycle.
    async fn place_bracket_order(&self, order: &BracketOrder) -> BrokerResult<OrderAck>;
}
