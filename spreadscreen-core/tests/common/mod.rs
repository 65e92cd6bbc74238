//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use spreadscreen_core::{Bar, PriceSeries};

pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// Bars from closes: open = previous close, high/low one point outside the
/// body, constant volume.
pub fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date() + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1_000,
            }
        })
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}

/// Bars whose open equals the close, so each low tracks its own close.
pub fn series_tracking_lows(symbol: &str, closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: base_date() + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        })
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}

pub fn rising(symbol: &str, n: usize, step: f64) -> PriceSeries {
    series(symbol, &(0..n).map(|i| 100.0 + i as f64 * step).collect::<Vec<_>>())
}

pub fn falling(symbol: &str, n: usize) -> PriceSeries {
    series(symbol, &(0..n).map(|i| 200.0 - i as f64).collect::<Vec<_>>())
}

/// Flat volatility index at `level`, last close replaced by `last`.
pub fn volatility(n: usize, level: f64, last: f64) -> PriceSeries {
    let mut closes = vec![level; n];
    if let Some(c) = closes.last_mut() {
        *c = last;
    }
    series("VIX", &closes)
}

/// Last day of the fixture series of length `n`.
pub fn as_of(n: usize) -> NaiveDate {
    base_date() + chrono::Duration::days(n as i64 - 1)
}
