//! PriceSeries — an immutable, date-ordered run of bars for one symbol.
//!
//! Series are produced by the data layer and consumed read-only by the
//! indicators and gates. The constructor is the only place the ordering
//! invariant is checked; everything downstream relies on it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bar::Bar;

/// Errors raised while building a series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("{symbol}: bar dates must be strictly increasing ({previous} then {next})")]
    NonIncreasingDates {
        symbol: String,
        previous: NaiveDate,
        next: NaiveDate,
    },

    #[error("{symbol}: bar on {date} has NaN prices")]
    VoidBar { symbol: String, date: NaiveDate },
}

/// Daily bars for one symbol, strictly increasing by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, validating date order and rejecting void bars.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        for bar in &bars {
            if bar.is_void() {
                return Err(SeriesError::VoidBar {
                    symbol,
                    date: bar.date,
                });
            }
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::NonIncreasingDates {
                    symbol,
                    previous: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

impl<'de> Deserialize<'de> for PriceSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            symbol: String,
            bars: Vec<Bar>,
        }

        let raw = Raw::deserialize(deserializer)?;
        PriceSeries::new(raw.symbol, raw.bars).map_err(serde::de::Error::custom)
    }
}
