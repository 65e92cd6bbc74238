//! Per-ticker options metadata supplied by an options-data provider.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Options-derived inputs for the event and volatility gate.
///
/// Every field is optional: a provider may know the earnings date but not
/// the IV history, or nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsSnapshot {
    /// IV rank, 0–100.
    pub iv_rank: Option<f64>,
    /// Implied-volatility change over five sessions, in percent.
    pub iv_change_5d_pct: Option<f64>,
    pub earnings_date: Option<NaiveDate>,
}

impl OptionsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.iv_rank.is_none() && self.iv_change_5d_pct.is_none() && self.earnings_date.is_none()
    }
}
