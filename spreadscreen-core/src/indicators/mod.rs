//! Indicator utilities.
//!
//! Every function here is pure and returns a single scalar (`f64`, `bool`, or
//! `Option<f64>` when a level may legitimately not exist). Nothing returns a
//! series, so every comparison a gate makes is between two plain numbers.
//!
//! All functions look at the *end* of the input: "the last `period` closes",
//! "the swing lows inside the trailing window". Inputs shorter than the
//! required lookback yield `IndicatorError::InsufficientData`.

pub mod atr;
pub mod extrema;
pub mod returns;
pub mod sma;
pub mod volume;

pub use atr::{atr, true_range};
pub use extrema::{consolidation_base_low, has_lower_low, most_recent_higher_low, swing_lows};
pub use returns::{n_day_return, pct_change};
pub use sma::{linear_slope, sma, sma_at, sma_slope};
pub use volume::{average_volume, down_day_volume_rising};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from indicator computation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IndicatorError {
    #[error("insufficient data for {indicator}: need {required} bars, have {available}")]
    InsufficientData {
        indicator: String,
        required: usize,
        available: usize,
    },

    #[error("{indicator}: period must be positive")]
    InvalidPeriod { indicator: String },

    #[error("{indicator} produced a non-finite value")]
    NonFinite { indicator: String },
}

pub(crate) fn require_len(
    indicator: &str,
    available: usize,
    required: usize,
) -> Result<(), IndicatorError> {
    if available < required {
        return Err(IndicatorError::InsufficientData {
            indicator: indicator.to_string(),
            required,
            available,
        });
    }
    Ok(())
}

pub(crate) fn require_period(indicator: &str, period: usize) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod {
            indicator: indicator.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn finite(indicator: &str, value: f64) -> Result<f64, IndicatorError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(IndicatorError::NonFinite {
            indicator: indicator.to_string(),
        })
    }
}

/// Create a synthetic series from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open, close) + 1,
/// low = min(open, close) - 1, volume = 1000.
#[cfg(test)]
pub fn make_series(closes: &[f64]) -> crate::domain::PriceSeries {
    use crate::domain::{Bar, PriceSeries};
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect();
    PriceSeries::new("TEST", bars).unwrap()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
