//! Deterministic synthetic price series.
//!
//! Used when no CSV exists for a symbol and the caller opted in. The RNG is
//! seeded from the BLAKE3 hash of the symbol, so the same symbol and end date
//! always produce the same bars. Results built on synthetic data are tagged
//! as such by the scan layer.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spreadscreen_core::{Bar, PriceSeries, SeriesError};

/// Generate `bars` weekday bars ending on or before `end`.
pub fn synthetic_series(symbol: &str, end: NaiveDate, bars: usize) -> Result<PriceSeries, SeriesError> {
    let seed = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let dates = trading_days_ending(end, bars);
    let mut price: f64 = rng.gen_range(20.0..400.0);
    let drift: f64 = rng.gen_range(-0.0005..0.0010);
    let volatility: f64 = rng.gen_range(0.008..0.025);
    let base_volume: u64 = rng.gen_range(500_000..20_000_000);

    let mut out = Vec::with_capacity(dates.len());
    for date in dates {
        let open = price;
        let change = drift + volatility * rng.gen_range(-1.0_f64..1.0);
        let close = (open * (1.0 + change)).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0_f64..volatility));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0_f64..volatility));
        let volume = (base_volume as f64 * rng.gen_range(0.5_f64..1.5)) as u64;
        out.push(Bar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }
    PriceSeries::new(symbol, out)
}

/// The last `n` weekdays up to and including `end`, oldest first.
fn trading_days_ending(end: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut date = end;
    while dates.len() < n {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(date);
        }
        date -= Duration::days(1);
    }
    dates.reverse();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 9).unwrap() // Sunday
    }

    #[test]
    fn same_symbol_same_bars() {
        let a = synthetic_series("AAPL", end(), 50).unwrap();
        let b = synthetic_series("AAPL", end(), 50).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_symbols_differ() {
        let a = synthetic_series("AAPL", end(), 50).unwrap();
        let b = synthetic_series("MSFT", end(), 50).unwrap();
        assert_ne!(a.closes(), b.closes());
    }

    #[test]
    fn skips_weekends_and_ends_on_friday() {
        let s = synthetic_series("SPY", end(), 20).unwrap();
        assert_eq!(s.len(), 20);
        assert!(s
            .bars()
            .iter()
            .all(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun)));
        assert_eq!(s.last_date(), NaiveDate::from_ymd_opt(2024, 6, 7));
    }

    #[test]
    fn bars_are_sane() {
        let s = synthetic_series("QQQ", end(), 252).unwrap();
        assert!(s.bars().iter().all(|b| b.is_sane()));
    }
}
