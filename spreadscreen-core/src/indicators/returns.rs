//! Point-to-point returns.

use super::{finite, require_len, require_period, IndicatorError};

/// N-day return as a fraction: `(last - last[-n]) / last[-n]`.
pub fn n_day_return(values: &[f64], n: usize) -> Result<f64, IndicatorError> {
    require_period("n_day_return", n)?;
    require_len("n_day_return", values.len(), n + 1)?;
    let current = values[values.len() - 1];
    let previous = values[values.len() - 1 - n];
    finite("n_day_return", (current - previous) / previous)
}

/// N-day change in percent (`n_day_return * 100`).
pub fn pct_change(values: &[f64], n: usize) -> Result<f64, IndicatorError> {
    Ok(n_day_return(values, n)? * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn return_over_window() {
        let values = [100.0, 105.0, 110.0];
        assert_approx(n_day_return(&values, 2).unwrap(), 0.10, DEFAULT_EPSILON);
        assert_approx(pct_change(&values, 2).unwrap(), 10.0, 1e-9);
    }

    #[test]
    fn return_needs_n_plus_one_values() {
        let err = n_day_return(&[100.0, 101.0], 2).unwrap_err();
        assert!(matches!(
            err,
            IndicatorError::InsufficientData {
                required: 3,
                available: 2,
                ..
            }
        ));
    }

    #[test]
    fn zero_base_is_non_finite() {
        assert!(matches!(
            n_day_return(&[0.0, 1.0], 1),
            Err(IndicatorError::NonFinite { .. })
        ));
    }
}
