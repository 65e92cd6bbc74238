//! Simple moving average and its trend slope.

use super::{finite, require_len, require_period, IndicatorError};

/// Mean of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Result<f64, IndicatorError> {
    sma_at(values, period, 0)
}

/// Mean of the `period` values ending `offset` bars before the last one.
///
/// `offset = 0` is today's SMA, `offset = 1` yesterday's, and so on.
pub fn sma_at(values: &[f64], period: usize, offset: usize) -> Result<f64, IndicatorError> {
    require_period("sma", period)?;
    require_len("sma", values.len(), period + offset)?;
    let end = values.len() - offset;
    let window = &values[end - period..end];
    finite("sma", window.iter().sum::<f64>() / period as f64)
}

/// Least-squares slope of the last `window` SMA values, per bar.
///
/// A window of 2 is simply today's SMA minus yesterday's. A result `>= 0`
/// means the average is not declining.
pub fn sma_slope(values: &[f64], sma_period: usize, window: usize) -> Result<f64, IndicatorError> {
    require_period("sma_slope", sma_period)?;
    if window < 2 {
        return Err(IndicatorError::InvalidPeriod {
            indicator: "sma_slope".into(),
        });
    }
    require_len("sma_slope", values.len(), sma_period + window - 1)?;
    let points = (0..window)
        .rev()
        .map(|offset| sma_at(values, sma_period, offset))
        .collect::<Result<Vec<f64>, _>>()?;
    linear_slope(&points)
}

/// Ordinary least-squares slope of `points` against their index.
pub fn linear_slope(points: &[f64]) -> Result<f64, IndicatorError> {
    require_len("linear_slope", points.len(), 2)?;
    let n = points.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = points.iter().sum::<f64>() / n;
    let (num, den) = points
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    finite("linear_slope", num / den)
}
