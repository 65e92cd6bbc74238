//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR here is the plain mean of the last `period` true ranges, so it needs
//! `period + 1` bars (every averaged bar has a previous close).

use crate::domain::{Bar, PriceSeries};

use super::{finite, require_len, require_period, IndicatorError};

/// True Range series.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            if i == 0 {
                return range;
            }
            let prev_close = bars[i - 1].close;
            range
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

/// Mean true range over the last `period` bars.
pub fn atr(series: &PriceSeries, period: usize) -> Result<f64, IndicatorError> {
    require_period("atr", period)?;
    require_len("atr", series.len(), period + 1)?;
    let tr = true_range(series.bars());
    let window = &tr[tr.len() - period..];
    finite("atr", window.iter().sum::<f64>() / period as f64)
}
