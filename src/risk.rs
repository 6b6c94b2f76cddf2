//! Bounded-risk position sizing
//!
//! Position sizing formula:
//! ```text
//! shares = floor((buying_power * risk_pct) / max(entry - stop, 0.01))
//! ```
//! then clamped so that `shares * entry` never exceeds buying power.
//!
//! All values are dimensionless: buying power and prices only need to share
//! a currency.

/// Smallest per-share risk used as the sizing denominator
pub const MIN_PER_SHARE_RISK: f64 = 0.01;

/// Compute an integer share quantity bounded by the risk budget and by
/// available capital.
///
/// Zero means "cannot afford a risk-bounded position" and is a normal skip
/// for the caller, not an error. Returns zero for non-positive or non-finite
/// inputs.
pub fn position_size(buying_power: f64, entry: f64, stop: f64, risk_pct: f64) -> u64 {
    if !(buying_power.is_finite() && entry.is_finite() && stop.is_finite() && risk_pct.is_finite())
    {
        return 0;
    }
    if entry <= 0.0 || buying_power <= 0.0 || risk_pct <= 0.0 {
        return 0;
    }

    let risk_dollars = buying_power * risk_pct;
    let per_share_risk = (entry - stop).max(MIN_PER_SHARE_RISK);
    let mut shares = (risk_dollars / per_share_risk).floor();

    if shares * entry > buying_power {
        shares = (buying_power / entry).floor();
    }

    if shares <= 0.0 {
        0
    } else {
        shares as u64
    }
}

/// Worst-case loss of `qty` shares stopped out at `stop`
pub fn risk_amount(qty: u64, entry: f64, stop: f64) -> f64 {
    (entry - stop).max(0.0) * qty as f64
}
