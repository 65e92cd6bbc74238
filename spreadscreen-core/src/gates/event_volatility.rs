//! Gate 4 — event and volatility.
//!
//! Keeps binary events and expanding volatility out of the trade window.
//! Conditions, in order:
//! 1. no earnings date inside the DTE window
//! 2. IV rank inside `[iv_rank_low, iv_rank_high]`
//! 3. IV five-day change at or below the threshold
//! 4. on a down day, volume no higher than the trailing average
//!
//! The first three depend on options data. When a field is absent the
//! sub-check is skipped and the details say so; only the volume check is
//! computed from the price series alone.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{finite, ordered, positive_period, ConfigError};
use crate::domain::{OptionsSnapshot, PriceSeries};
use crate::indicators::average_volume;

use super::{
    record, record_flag, record_number, run_conditions, Condition, DetailValue, FailKind,
    FailReason, GateDetails, GateId, GateResult,
};

const NO_OPTIONS_DATA: &str = "no options data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventVolatilityConfig {
    pub min_dte: i64,
    pub max_dte: i64,
    /// Guard earnings anywhere from today to `max_dte`, not only inside `[min_dte, max_dte]`.
    pub guard_full_trade_life: bool,
    pub iv_rank_low: f64,
    pub iv_rank_high: f64,
    /// Maximum IV five-day change, in percent.
    pub iv_change_threshold_pct: f64,
    pub volume_avg_period: usize,
}

impl Default for EventVolatilityConfig {
    fn default() -> Self {
        Self {
            min_dte: 30,
            max_dte: 45,
            guard_full_trade_life: false,
            iv_rank_low: 20.0,
            iv_rank_high: 60.0,
            iv_change_threshold_pct: 5.0,
            volume_avg_period: 20,
        }
    }
}

impl EventVolatilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_dte < 0 {
            return Err(ConfigError::invalid(
                "event_volatility.min_dte",
                "must not be negative",
            ));
        }
        ordered("event_volatility.dte", self.min_dte, self.max_dte)?;
        finite("event_volatility.iv_rank_low", self.iv_rank_low)?;
        finite("event_volatility.iv_rank_high", self.iv_rank_high)?;
        ordered("event_volatility.iv_rank", self.iv_rank_low, self.iv_rank_high)?;
        if self.iv_rank_low < 0.0 || self.iv_rank_high > 100.0 {
            return Err(ConfigError::invalid(
                "event_volatility.iv_rank",
                "band must lie within 0..=100",
            ));
        }
        finite(
            "event_volatility.iv_change_threshold_pct",
            self.iv_change_threshold_pct,
        )?;
        positive_period("event_volatility.volume_avg_period", self.volume_avg_period)
    }

    /// Days-to-earnings band that conflicts with a new trade.
    pub fn earnings_window(&self) -> (i64, i64) {
        if self.guard_full_trade_life {
            (0, self.max_dte)
        } else {
            (self.min_dte, self.max_dte)
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventVolatilityGate {
    config: EventVolatilityConfig,
}

struct EventInputs<'a> {
    config: &'a EventVolatilityConfig,
    series: &'a PriceSeries,
    as_of: NaiveDate,
    options: Option<&'a OptionsSnapshot>,
}

impl EventVolatilityGate {
    pub fn new(config: EventVolatilityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Evaluate on `as_of`. `options` is `None` when no provider is configured.
    pub fn evaluate(
        &self,
        series: &PriceSeries,
        as_of: NaiveDate,
        options: Option<&OptionsSnapshot>,
    ) -> GateResult {
        let inputs = EventInputs {
            config: &self.config,
            series,
            as_of,
            options,
        };
        let conditions = [
            no_earnings_in_window as Condition<_>,
            iv_rank_in_band as Condition<_>,
            iv_not_expanding as Condition<_>,
            down_day_volume_normal as Condition<_>,
        ];
        run_conditions(GateId::EventVolatility, &inputs, &conditions)
    }
}

fn no_earnings_in_window(
    inputs: &EventInputs<'_>,
    details: &mut GateDetails,
) -> Result<(), FailReason> {
    let Some(earnings) = inputs.options.and_then(|o| o.earnings_date) else {
        record(details, "earnings_date", DetailValue::skipped(NO_OPTIONS_DATA));
        return Ok(());
    };
    let days = (earnings - inputs.as_of).num_days();
    let (low, high) = inputs.config.earnings_window();
    record(details, "earnings_date", DetailValue::Date(earnings));
    record_number(details, "days_to_earnings", days as f64);
    if (low..=high).contains(&days) {
        return Err(FailReason::new(
            FailKind::EarningsInWindow,
            format!("earnings in {days} days (inside {low}-{high} day window)"),
        ));
    }
    Ok(())
}

fn iv_rank_in_band(inputs: &EventInputs<'_>, details: &mut GateDetails) -> Result<(), FailReason> {
    let Some(rank) = inputs.options.and_then(|o| o.iv_rank) else {
        record(details, "iv_rank", DetailValue::skipped(NO_OPTIONS_DATA));
        return Ok(());
    };
    record_number(details, "iv_rank", rank);
    let (low, high) = (inputs.config.iv_rank_low, inputs.config.iv_rank_high);
    if rank < low {
        return Err(FailReason::new(
            FailKind::IvRankOutOfRange,
            format!("IV rank too low ({rank:.1} < {low:.1})"),
        ));
    }
    if rank > high {
        return Err(FailReason::new(
            FailKind::IvRankOutOfRange,
            format!("IV rank too high ({rank:.1} > {high:.1})"),
        ));
    }
    Ok(())
}

fn iv_not_expanding(inputs: &EventInputs<'_>, details: &mut GateDetails) -> Result<(), FailReason> {
    let Some(change) = inputs.options.and_then(|o| o.iv_change_5d_pct) else {
        record(details, "iv_change_5d_pct", DetailValue::skipped(NO_OPTIONS_DATA));
        return Ok(());
    };
    record_number(details, "iv_change_5d_pct", change);
    let limit = inputs.config.iv_change_threshold_pct;
    if change > limit {
        return Err(FailReason::new(
            FailKind::IvExpanding,
            format!("IV expanding ({change:+.1}% in 5 days, limit {limit:.1}%)"),
        ));
    }
    Ok(())
}

fn down_day_volume_normal(
    inputs: &EventInputs<'_>,
    details: &mut GateDetails,
) -> Result<(), FailReason> {
    let period = inputs.config.volume_avg_period;
    let average = average_volume(inputs.series, period)?;
    let bars = inputs.series.bars();
    let today = &bars[bars.len() - 1];
    let yesterday = &bars[bars.len() - 2];
    let down_day = today.is_down_from(yesterday.close);
    let volume = today.volume as f64;
    record_flag(details, "down_day", down_day);
    record_number(details, "volume", volume);
    record_number(details, "avg_volume", average);
    if down_day && volume > average {
        return Err(FailReason::new(
            FailKind::HeavyDownDayVolume,
            format!("heavy volume on down day ({volume:.0} vs {period}-day avg {average:.0})"),
        ));
    }
    Ok(())
}
