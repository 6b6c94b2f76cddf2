//! Technical indicators over ordered numeric windows
//!
//! Every function looks only at the tail of its input and is total: when the
//! window is too short the result is `None`, never NaN and never a panic.
//! Callers must match on the result before using it.
//!
//! Available indicators:
//! - `sma`: Simple Moving Average of the last `n` values
//! - `highest`: rolling maximum of the last `n` values
//! - `true_range` / `atr`: Average True Range (simple mean of true ranges)

use ta::indicators::{Maximum, SimpleMovingAverage};
use ta::Next;

/// Default ATR lookback
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// Tail of `values` holding exactly `period` elements, if there are enough
fn window(values: &[f64], period: usize) -> Option<&[f64]> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(&values[values.len() - period..])
}

/// Simple Moving Average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    let tail = window(values, period)?;
    let mut indicator = SimpleMovingAverage::new(period).ok()?;
    tail.iter().fold(None, |_, &v| Some(indicator.next(v)))
}

/// Highest of the last `period` values
pub fn highest(values: &[f64], period: usize) -> Option<f64> {
    let tail = window(values, period)?;
    let mut indicator = Maximum::new(period).ok()?;
    tail.iter().fold(None, |_, &v| Some(indicator.next(v)))
}

/// True range for every bar that has a previous close.
///
/// The output is one element shorter than the input: entry `i - 1` holds
/// `max(high[i] - low[i], |high[i] - close[i-1]|, |low[i] - close[i-1]|)`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let len = high.len().min(low.len()).min(close.len());
    (1..len)
        .map(|i| {
            let prev_close = close[i - 1];
            let hl = high[i] - low[i];
            let hc = (high[i] - prev_close).abs();
            let lc = (low[i] - prev_close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// Average True Range: arithmetic mean of the last `period` true ranges.
///
/// Needs at least `period + 1` closes and equal-length inputs.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    if period == 0 || high.len() != low.len() || high.len() != close.len() {
        return None;
    }
    if close.len() < period + 1 {
        return None;
    }

    let tr = true_range(high, low, close);
    let tail = window(&tr, period)?;
    Some(tail.iter().sum::<f64>() / period as f64)
}

// =============================================================================
// Tests
// =============================================================================
