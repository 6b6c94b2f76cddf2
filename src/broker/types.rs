//! Broker REST API data structures

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::orders::BracketOrder;
use crate::types::{Account, Bar, Clock, Snapshot, TradingStatus};

/// `GET /v2/clock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockInfo {
    pub is_open: bool,
    #[serde(default)]
    pub next_open: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_close: Option<DateTime<Utc>>,
}

impl From<ClockInfo> for Clock {
    fn from(info: ClockInfo) -> Self {
        Clock {
            is_open: info.is_open,
            next_open: info.next_open,
            next_close: info.next_close,
        }
    }
}

/// `GET /v2/account`. Amounts arrive as decimal strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub buying_power: Option<String>,
    #[serde(default)]
    pub equity: Option<String>,
    #[serde(default)]
    pub trading_blocked: bool,
}

fn parse_amount(field: &str, raw: Option<&str>) -> Result<Decimal> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Decimal::ZERO),
        Some(s) => Decimal::from_str(s)
            .with_context(|| format!("Malformed account {}: {:?}", field, s)),
    }
}

impl TryFrom<AccountInfo> for Account {
    type Error = anyhow::Error;

    fn try_from(info: AccountInfo) -> Result<Self> {
        Ok(Account {
            buying_power: parse_amount("buying_power", info.buying_power.as_deref())?,
            equity: parse_amount("equity", info.equity.as_deref())?,
            trading_blocked: info.trading_blocked,
        })
    }
}

/// One entry of `GET /v2/positions`. Only counted by the scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionInfo {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub qty: String,
}

/// `GET /v2/stocks/{symbol}/bars`
#[derive(Debug, Clone, Deserialize)]
pub struct BarsResponse {
    #[serde(default)]
    pub bars: Option<Vec<Bar>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// `GET /v2/stocks/{symbol}/snapshot`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotInfo {
    #[serde(default)]
    pub trading_status: Option<String>,
}

impl From<SnapshotInfo> for Snapshot {
    fn from(info: SnapshotInfo) -> Self {
        Snapshot {
            trading_status: info
                .trading_status
                .as_deref()
                .map(TradingStatus::from_code)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TakeProfitLeg {
    #[serde(with = "rust_decimal::serde::str")]
    pub limit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopLossLeg {
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_price: Decimal,
}

/// `POST /v2/orders` body for a bracket entry
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: u64,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub time_in_force: String,
    pub order_class: String,
    pub take_profit: TakeProfitLeg,
    pub stop_loss: StopLossLeg,
}

impl From<&BracketOrder> for OrderRequest {
    fn from(order: &BracketOrder) -> Self {
        OrderRequest {
            symbol: order.symbol.clone(),
            qty: order.qty,
            side: "buy".to_string(),
            order_type: "market".to_string(),
            time_in_force: order.time_in_force.clone(),
            order_class: "bracket".to_string(),
            take_profit: TakeProfitLeg {
                limit_price: order.take_profit_price,
            },
            stop_loss: StopLossLeg {
                stop_price: order.stop_price,
            },
        }
    }
}

/// Broker acknowledgement of a submitted order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
}
