//! Volume-confirmed breakout screener
//!
//! A symbol becomes a [`Candidate`] when its latest close clears the highest
//! high of the previous 20 bars on a volume surge, while sitting inside the
//! configured price band with enough average liquidity. Stops and targets are
//! placed at ATR multiples around the close.
//!
//! The pure part of the pipeline lives in [`screen_bars`] so it can be tested
//! without a broker; [`BreakoutScreener`] adds the bar and snapshot fetches.

use thiserror::Error;
use tracing::debug;

use crate::broker::Broker;
use crate::config::ScanConfig;
use crate::indicators::{atr, highest, sma, DEFAULT_ATR_PERIOD};
use crate::types::{is_valid_bracket, Bar, BarSeries, Candidate, TradingStatus};

/// Bars requested per symbol
pub const BAR_LIMIT: usize = 120;

/// Minimum history needed to evaluate a symbol
pub const MIN_BARS: usize = 40;

/// Window for the liquidity filter
pub const AVG_VOLUME_PERIOD: usize = 30;

/// Window for the breakout level, excluding the current bar
pub const BREAKOUT_LOOKBACK: usize = 20;

/// Current volume must exceed this multiple of its baseline
pub const VOLUME_SURGE_MULT: f64 = 1.5;

/// Floor for the ATR denominator in the strength score
pub const MIN_ATR_FLOOR: f64 = 0.01;

/// Why a symbol produced no candidate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("bars unavailable: {0}")]
    BarsUnavailable(String),

    #[error("insufficient history ({have} bars, need {need})")]
    InsufficientBars { have: usize, need: usize },

    #[error("price {price:.2} outside [{min:.2}, {max:.2}]")]
    PriceOutOfRange { price: f64, min: f64, max: f64 },

    #[error("average volume {avg:.0} below {min:.0}")]
    LowVolume { avg: f64, min: f64 },

    #[error("close {close:.2} does not clear breakout level {level:.2}")]
    NoBreakout { close: f64, level: f64 },

    #[error("volume {volume:.0} is not a surge over baseline {baseline:.0}")]
    NoVolumeSurge { volume: f64, baseline: f64 },

    #[error("{0} undefined")]
    IndicatorUndefined(&'static str),

    #[error("degenerate bracket (stop={stop:.2}, entry={entry:.2}, take={take:.2})")]
    InvalidBracket { stop: f64, entry: f64, take: f64 },

    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("not tradeable: {0}")]
    Untradeable(TradingStatus),
}

/// Thresholds the bar-only stages need
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenParams {
    pub min_price: f64,
    pub max_price: f64,
    pub min_avg_volume: f64,
    pub stop_atr_mult: f64,
    pub take_profit_atr_mult: f64,
}

impl From<&ScanConfig> for ScreenParams {
    fn from(config: &ScanConfig) -> Self {
        Self {
            min_price: config.min_price,
            max_price: config.max_price,
            min_avg_volume: config.min_avg_volume,
            stop_atr_mult: config.stop_atr_mult,
            take_profit_atr_mult: config.take_profit_atr_mult,
        }
    }
}

/// Baseline the current volume is compared against: the mean of the 20 bars
/// before the current one, or the 30-bar average on short histories.
fn volume_baseline(volumes: &[f64], avg_volume: f64) -> f64 {
    let n = volumes.len();
    if n > BREAKOUT_LOOKBACK + 1 {
        let prior = &volumes[n - BREAKOUT_LOOKBACK - 1..n - 1];
        prior.iter().sum::<f64>() / BREAKOUT_LOOKBACK as f64
    } else {
        avg_volume
    }
}

/// Run the bar-only screening stages for `symbol`.
///
/// Stages short-circuit in order: history length, price band, liquidity,
/// breakout + volume surge, ATR, bracket sanity.
pub fn screen_bars(
    symbol: &str,
    bars: &[Bar],
    params: &ScreenParams,
) -> Result<Candidate, Rejection> {
    if bars.len() < MIN_BARS {
        return Err(Rejection::InsufficientBars {
            have: bars.len(),
            need: MIN_BARS,
        });
    }

    let series = BarSeries::from_bars(bars);
    let n = series.len();
    let last = series.closes[n - 1];

    if !(params.min_price <= last && last <= params.max_price) {
        return Err(Rejection::PriceOutOfRange {
            price: last,
            min: params.min_price,
            max: params.max_price,
        });
    }

    let avg_volume = sma(&series.volumes, AVG_VOLUME_PERIOD)
        .ok_or(Rejection::IndicatorUndefined("average volume"))?;
    if avg_volume < params.min_avg_volume {
        return Err(Rejection::LowVolume {
            avg: avg_volume,
            min: params.min_avg_volume,
        });
    }

    let breakout_level = highest(&series.highs[..n - 1], BREAKOUT_LOOKBACK)
        .ok_or(Rejection::IndicatorUndefined("breakout level"))?;
    if last <= breakout_level {
        return Err(Rejection::NoBreakout {
            close: last,
            level: breakout_level,
        });
    }

    let volume = series.volumes[n - 1];
    let baseline = volume_baseline(&series.volumes, avg_volume);
    if volume <= VOLUME_SURGE_MULT * baseline {
        return Err(Rejection::NoVolumeSurge { volume, baseline });
    }

    let atr = atr(
        &series.highs,
        &series.lows,
        &series.closes,
        DEFAULT_ATR_PERIOD,
    )
    .ok_or(Rejection::IndicatorUndefined("ATR"))?;

    let stop = last - params.stop_atr_mult * atr;
    let take = last + params.take_profit_atr_mult * atr;
    if !is_valid_bracket(stop, last, take) {
        return Err(Rejection::InvalidBracket {
            stop,
            entry: last,
            take,
        });
    }

    Ok(Candidate {
        symbol: symbol.to_string(),
        entry: last,
        stop,
        take,
        atr,
        avg_volume,
        breakout_level,
        strength: (last - breakout_level) / atr.max(MIN_ATR_FLOOR),
    })
}

/// Screener bound to one scan configuration
#[derive(Debug, Clone)]
pub struct BreakoutScreener {
    params: ScreenParams,
    timeframe: String,
}

impl BreakoutScreener {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            params: ScreenParams::from(config),
            timeframe: config.timeframe.clone(),
        }
    }

    /// Full pipeline for one symbol, reporting why it was rejected
    pub async fn screen<B: Broker>(&self, broker: &B, symbol: &str) -> Result<Candidate, Rejection> {
        let bars = broker
            .bars(symbol, &self.timeframe, BAR_LIMIT)
            .await
            .map_err(|e| Rejection::BarsUnavailable(e.to_string()))?;

        let candidate = screen_bars(symbol, &bars, &self.params)?;

        // Snapshot last: it is only worth a request once the bars qualify
        let snapshot = broker
            .snapshot(symbol)
            .await
            .map_err(|e| Rejection::SnapshotUnavailable(e.to_string()))?;
        if !snapshot.trading_status.is_tradeable() {
            return Err(Rejection::Untradeable(snapshot.trading_status));
        }

        Ok(candidate)
    }

    /// Candidate for `symbol`, or `None` with the reason logged at debug
    pub async fn evaluate<B: Broker>(&self, broker: &B, symbol: &str) -> Option<Candidate> {
        match self.screen(broker, symbol).await {
            Ok(candidate) => {
                debug!(
                    "{}: breakout close={:.2} level={:.2} atr={:.2} strength={:.2}",
                    symbol,
                    candidate.entry,
                    candidate.breakout_level,
                    candidate.atr,
                    candidate.strength
                );
                Some(candidate)
            }
            Err(reason) => {
                debug!("{}: rejected, {}", symbol, reason);
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
