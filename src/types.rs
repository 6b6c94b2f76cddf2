//! Core data types used across the scanner

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One fixed-length interval of trading activity for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
}

/// Column view over a bar window, the shape the indicators consume
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl BarSeries {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut series = BarSeries {
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            closes: Vec::with_capacity(bars.len()),
            volumes: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            series.highs.push(bar.high);
            series.lows.push(bar.low);
            series.closes.push(bar.close);
            series.volumes.push(bar.volume);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// Exchange trading-status classification for a symbol
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TradingStatus {
    #[default]
    Normal,
    Halted,
    /// Trading halted pending news (`T1`)
    NewsPending,
    LimitUpLimitDown,
    Unknown(String),
}

impl TradingStatus {
    /// Map a raw exchange status code
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "" | "T" | "Normal" => TradingStatus::Normal,
            "H" | "Halted" => TradingStatus::Halted,
            "T1" => TradingStatus::NewsPending,
            "LULD" => TradingStatus::LimitUpLimitDown,
            other => TradingStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_tradeable(&self) -> bool {
        !matches!(self, TradingStatus::Halted | TradingStatus::NewsPending)
    }
}

impl std::fmt::Display for TradingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingStatus::Normal => write!(f, "normal"),
            TradingStatus::Halted => write!(f, "halted"),
            TradingStatus::NewsPending => write!(f, "halted (news pending)"),
            TradingStatus::LimitUpLimitDown => write!(f, "limit up/limit down"),
            TradingStatus::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

/// Current trading-status snapshot for a symbol
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub trading_status: TradingStatus,
}

/// Spendable capital and blocking state, read fresh every cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Account {
    pub buying_power: Decimal,
    pub equity: Decimal,
    pub trading_blocked: bool,
}

/// Exchange clock
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    pub is_open: bool,
    pub next_open: Option<DateTime<Utc>>,
    pub next_close: Option<DateTime<Utc>>,
}

/// A breakout detection awaiting ranking and sizing. Lives for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: String,
    pub entry: f64,
    pub stop: f64,
    pub take: f64,
    pub atr: f64,
    pub avg_volume: f64,
    /// Highest high of the 20 bars before the breakout bar
    pub breakout_level: f64,
    /// Breakout magnitude in ATR units, used only for ranking
    pub strength: f64,
}

impl Candidate {
    /// `stop < entry < take`
    pub fn has_valid_bracket(&self) -> bool {
        is_valid_bracket(self.stop, self.entry, self.take)
    }
}

pub(crate) fn is_valid_bracket(stop: f64, entry: f64, take: f64) -> bool {
    stop.is_finite() && entry.is_finite() && take.is_finite() && stop < entry && entry < take
}
