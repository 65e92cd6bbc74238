//! Gate 3 — structural safety.
//!
//! A short put strike should sit below every price floor the chart shows.
//! Four support levels are gathered:
//! - the SMA
//! - the most recent higher low
//! - the low of the most recent consolidation base
//! - current price minus `atr_multiple` x ATR (when the ATR filter is on)
//!
//! Higher-low and base levels may not exist in the window; they are then
//! skipped and noted in the details. The maximum safe strike is the lowest
//! support shaved by `safety_margin_pct`, so it always sits strictly below
//! every level. A candidate strike passes when it is below each level and
//! no higher than the maximum safe strike.

use serde::{Deserialize, Serialize};

use crate::config::{positive, positive_period, ConfigError};
use crate::domain::PriceSeries;
use crate::indicators::{atr, consolidation_base_low, most_recent_higher_low, sma, IndicatorError};

use super::{
    record, record_number, run_conditions, Condition, DetailValue, FailKind, FailReason,
    GateDetails, GateId, GateResult,
};

/// Detail key holding the maximum safe strike.
pub const MAX_SAFE_STRIKE: &str = "max_safe_strike";
/// Detail key holding the discount of the maximum safe strike to the current price, in percent.
pub const DISCOUNT_PCT: &str = "discount_pct";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralSafetyConfig {
    pub sma_period: usize,
    pub enable_atr_filter: bool,
    pub atr_multiple: f64,
    pub atr_period: usize,
    /// Bars searched for higher lows and consolidation bases.
    pub swing_lookback: usize,
    pub base_min_days: usize,
    pub base_tolerance_pct: f64,
    /// Percent shaved off the lowest support to get the maximum safe strike.
    pub safety_margin_pct: f64,
}

impl Default for StructuralSafetyConfig {
    fn default() -> Self {
        Self {
            sma_period: 50,
            enable_atr_filter: true,
            atr_multiple: 1.5,
            atr_period: 14,
            swing_lookback: 60,
            base_min_days: 5,
            base_tolerance_pct: 2.0,
            safety_margin_pct: 1.0,
        }
    }
}

impl StructuralSafetyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_period("structural_safety.sma_period", self.sma_period)?;
        positive_period("structural_safety.atr_period", self.atr_period)?;
        positive_period("structural_safety.swing_lookback", self.swing_lookback)?;
        positive_period("structural_safety.base_min_days", self.base_min_days)?;
        positive("structural_safety.atr_multiple", self.atr_multiple)?;
        positive("structural_safety.base_tolerance_pct", self.base_tolerance_pct)?;
        positive("structural_safety.safety_margin_pct", self.safety_margin_pct)?;
        if self.safety_margin_pct >= 100.0 {
            return Err(ConfigError::invalid(
                "structural_safety.safety_margin_pct",
                "must be below 100",
            ));
        }
        Ok(())
    }
}

/// Support levels computed from one ticker's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportLevels {
    pub current_price: f64,
    pub sma: f64,
    pub higher_low: Option<f64>,
    pub base_low: Option<f64>,
    pub atr: Option<f64>,
    /// `current_price - atr_multiple * atr`; `None` when the ATR filter is off.
    pub atr_level: Option<f64>,
}

impl SupportLevels {
    /// Present levels in evaluation order.
    pub fn levels(&self) -> Vec<(&'static str, f64)> {
        let mut levels = vec![("sma", self.sma)];
        if let Some(v) = self.higher_low {
            levels.push(("higher_low", v));
        }
        if let Some(v) = self.base_low {
            levels.push(("base_low", v));
        }
        if let Some(v) = self.atr_level {
            levels.push(("atr_level", v));
        }
        levels
    }

    /// Lowest present support level.
    pub fn minimum(&self) -> f64 {
        self.levels()
            .into_iter()
            .map(|(_, v)| v)
            .fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone)]
pub struct StructuralSafetyGate {
    config: StructuralSafetyConfig,
}

struct StrikeInputs<'a> {
    config: &'a StructuralSafetyConfig,
    levels: &'a SupportLevels,
    strike: f64,
    strike_is_candidate: bool,
    max_safe_strike: f64,
}

impl StructuralSafetyGate {
    pub fn new(config: StructuralSafetyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Gather the support levels for a series.
    pub fn support_levels(&self, series: &PriceSeries) -> Result<SupportLevels, IndicatorError> {
        let closes = series.closes();
        let lows = series.lows();
        let average = sma(&closes, self.config.sma_period)?;
        let current_price = closes[closes.len() - 1];
        let higher_low = most_recent_higher_low(&lows, self.config.swing_lookback)?;
        let base_low = consolidation_base_low(
            &lows,
            self.config.swing_lookback,
            self.config.base_min_days,
            self.config.base_tolerance_pct,
        )?;
        let (atr_value, atr_level) = if self.config.enable_atr_filter {
            let value = atr(series, self.config.atr_period)?;
            (Some(value), Some(current_price - self.config.atr_multiple * value))
        } else {
            (None, None)
        };
        Ok(SupportLevels {
            current_price,
            sma: average,
            higher_low,
            base_low,
            atr: atr_value,
            atr_level,
        })
    }

    /// Lowest support less the configured safety margin. The margin is taken
    /// from the magnitude of the support, so the result stays strictly below it
    /// even when the lowest level is zero or negative.
    pub fn max_safe_strike(&self, levels: &SupportLevels) -> f64 {
        let minimum = levels.minimum();
        let shave = minimum.abs() * self.config.safety_margin_pct / 100.0;
        minimum - shave.max(f64::MIN_POSITIVE)
    }

    /// Evaluate a candidate strike (or, without one, the maximum safe strike) for a series.
    pub fn evaluate(&self, series: &PriceSeries, candidate_strike: Option<f64>) -> GateResult {
        match self.support_levels(series) {
            Ok(levels) => self.judge(&levels, candidate_strike),
            Err(err) => GateResult::failed(GateId::StructuralSafety, err.into(), GateDetails::new()),
        }
    }

    /// Evaluate a candidate strike against already-computed support levels.
    pub fn judge(&self, levels: &SupportLevels, candidate_strike: Option<f64>) -> GateResult {
        let max_safe_strike = self.max_safe_strike(levels);
        let inputs = StrikeInputs {
            config: &self.config,
            levels,
            strike: candidate_strike.unwrap_or(max_safe_strike),
            strike_is_candidate: candidate_strike.is_some(),
            max_safe_strike,
        };
        let conditions = [
            record_levels as Condition<_>,
            viable_strike as Condition<_>,
            below_sma as Condition<_>,
            below_higher_low as Condition<_>,
            below_base_low as Condition<_>,
            below_atr_level as Condition<_>,
            within_safety_margin as Condition<_>,
        ];
        run_conditions(GateId::StructuralSafety, &inputs, &conditions)
    }
}

fn optional_level(value: Option<f64>, why_missing: &str) -> DetailValue {
    value
        .map(DetailValue::Number)
        .unwrap_or_else(|| DetailValue::skipped(why_missing))
}

fn record_levels(inputs: &StrikeInputs<'_>, details: &mut GateDetails) -> Result<(), FailReason> {
    let levels = inputs.levels;
    record_number(details, "current_price", levels.current_price);
    record_number(details, "level_sma", levels.sma);
    record(
        details,
        "level_higher_low",
        optional_level(levels.higher_low, "no higher low in window"),
    );
    record(
        details,
        "level_base_low",
        optional_level(levels.base_low, "no consolidation base in window"),
    );
    let atr_note = if inputs.config.enable_atr_filter {
        "ATR unavailable"
    } else {
        "ATR filter disabled"
    };
    record(details, "atr", optional_level(levels.atr, atr_note));
    record(details, "level_atr", optional_level(levels.atr_level, atr_note));
    record_number(details, "min_support", levels.minimum());
    record_number(details, MAX_SAFE_STRIKE, inputs.max_safe_strike);
    if levels.current_price > 0.0 {
        let discount =
            (levels.current_price - inputs.max_safe_strike) / levels.current_price * 100.0;
        record_number(details, DISCOUNT_PCT, discount);
    }
    record_number(details, "strike", inputs.strike);
    let source = if inputs.strike_is_candidate {
        "candidate"
    } else {
        MAX_SAFE_STRIKE
    };
    record(details, "strike_source", DetailValue::Text(source.into()));
    Ok(())
}

fn viable_strike(inputs: &StrikeInputs<'_>, _details: &mut GateDetails) -> Result<(), FailReason> {
    if !inputs.strike.is_finite() {
        return Err(FailReason::new(
            FailKind::NoViableStrike,
            format!("strike {} is not a finite price", inputs.strike),
        ));
    }
    if inputs.max_safe_strike <= 0.0 || inputs.strike <= 0.0 {
        return Err(FailReason::new(
            FailKind::NoViableStrike,
            format!(
                "no positive strike below support (max safe strike {:.2})",
                inputs.max_safe_strike
            ),
        ));
    }
    Ok(())
}

fn strike_below(label: &str, level: Option<f64>, strike: f64) -> Result<(), FailReason> {
    match level {
        Some(level) if strike >= level => Err(FailReason::new(
            FailKind::StrikeAboveSupport,
            format!("strike at or above {label} ({strike:.2} >= {level:.2})"),
        )),
        _ => Ok(()),
    }
}

fn below_sma(inputs: &StrikeInputs<'_>, _details: &mut GateDetails) -> Result<(), FailReason> {
    let label = format!("{}-SMA", inputs.config.sma_period);
    strike_below(&label, Some(inputs.levels.sma), inputs.strike)
}

fn below_higher_low(inputs: &StrikeInputs<'_>, _details: &mut GateDetails) -> Result<(), FailReason> {
    strike_below("higher low", inputs.levels.higher_low, inputs.strike)
}

fn below_base_low(inputs: &StrikeInputs<'_>, _details: &mut GateDetails) -> Result<(), FailReason> {
    strike_below("consolidation base", inputs.levels.base_low, inputs.strike)
}

fn below_atr_level(inputs: &StrikeInputs<'_>, _details: &mut GateDetails) -> Result<(), FailReason> {
    let label = format!("{}x ATR level", inputs.config.atr_multiple);
    strike_below(&label, inputs.levels.atr_level, inputs.strike)
}

fn within_safety_margin(
    inputs: &StrikeInputs<'_>,
    _details: &mut GateDetails,
) -> Result<(), FailReason> {
    if inputs.strike > inputs.max_safe_strike {
        return Err(FailReason::new(
            FailKind::StrikeAboveSupport,
            format!(
                "strike inside {:.1}% safety margin ({:.2} > max safe {:.2})",
                inputs.config.safety_margin_pct, inputs.strike, inputs.max_safe_strike
            ),
        ));
    }
    Ok(())
}
