//! Swing-low structure: lower lows, higher lows, consolidation bases.

use super::{require_len, require_period, IndicatorError};

/// Strict local minima `(index, value)` of `lows`, oldest first.
///
/// A point is a swing low when it is strictly below both neighbours. The
/// first and last points never qualify.
pub fn swing_lows(lows: &[f64]) -> Vec<(usize, f64)> {
    collect_minima(lows, |here, left, right| here < left && here < right)
}

fn collect_minima(lows: &[f64], is_min: impl Fn(f64, f64, f64) -> bool) -> Vec<(usize, f64)> {
    if lows.len() < 3 {
        return Vec::new();
    }
    (1..lows.len() - 1)
        .filter(|&i| is_min(lows[i], lows[i - 1], lows[i + 1]))
        .map(|i| (i, lows[i]))
        .collect()
}

/// True if a lower low formed inside the trailing `lookback` bars.
///
/// A lower low is a swing low strictly below the swing low preceding it
/// within the same window.
pub fn has_lower_low(lows: &[f64], lookback: usize) -> Result<bool, IndicatorError> {
    if lookback < 3 {
        return Err(IndicatorError::InvalidPeriod {
            indicator: "lower_low".into(),
        });
    }
    require_len("lower_low", lows.len(), lookback)?;
    let window = &lows[lows.len() - lookback..];
    let swings = swing_lows(window);
    Ok(swings.windows(2).any(|pair| pair[1].1 < pair[0].1))
}

/// Minimum number of bars before higher-low detection is meaningful.
pub const HIGHER_LOW_MIN_BARS: usize = 5;

/// Most recent swing low that sits above the swing low before it.
///
/// Uses non-strict minima so flat bottoms still register. Looks at the last
/// `lookback` bars (or the whole input when shorter). `Ok(None)` when the
/// window holds no higher low.
pub fn most_recent_higher_low(lows: &[f64], lookback: usize) -> Result<Option<f64>, IndicatorError> {
    require_period("higher_low", lookback)?;
    require_len("higher_low", lows.len(), HIGHER_LOW_MIN_BARS)?;
    let window = &lows[lows.len().saturating_sub(lookback)..];
    let swings = collect_minima(window, |here, left, right| here <= left && here <= right);
    Ok(swings
        .windows(2)
        .rev()
        .find(|pair| pair[1].1 > pair[0].1)
        .map(|pair| pair[1].1))
}

/// Low of the most recent consolidation base.
///
/// A base is `min_days` consecutive bars whose lows stay within
/// `tolerance_pct` percent of their minimum. Scans from the most recent
/// window backwards over the last `lookback` bars; needs at least
/// `2 * min_days` bars of history.
pub fn consolidation_base_low(
    lows: &[f64],
    lookback: usize,
    min_days: usize,
    tolerance_pct: f64,
) -> Result<Option<f64>, IndicatorError> {
    require_period("consolidation_base", lookback)?;
    require_period("consolidation_base", min_days)?;
    require_len("consolidation_base", lows.len(), 2 * min_days)?;
    let window = &lows[lows.len().saturating_sub(lookback)..];
    if window.len() < min_days {
        return Ok(None);
    }
    let tolerance = tolerance_pct / 100.0;
    for start in (0..=window.len() - min_days).rev() {
        let run = &window[start..start + min_days];
        let lo = run.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = run.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo > 0.0 && (hi - lo) / lo <= tolerance {
            return Ok(Some(lo));
        }
    }
    Ok(None)
}
