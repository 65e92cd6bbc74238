//! Gate 2 — relative strength.
//!
//! A ticker qualifies when it is outrunning the index and holding its own
//! uptrend: N-day return above the index's, close above its SMA, SMA not
//! declining. The return spread is reported as `relative_strength_pct`.

use serde::{Deserialize, Serialize};

use crate::config::{positive_period, ConfigError};
use crate::domain::PriceSeries;
use crate::indicators::{pct_change, sma, sma_slope};

use super::{
    record_flag, record_number, run_conditions, Condition, FailKind, FailReason, GateDetails,
    GateId, GateResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelativeStrengthConfig {
    pub return_period: usize,
    pub sma_period: usize,
    pub slope_window: usize,
}

impl Default for RelativeStrengthConfig {
    fn default() -> Self {
        Self {
            return_period: 30,
            sma_period: 50,
            slope_window: 2,
        }
    }
}

impl RelativeStrengthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_period("relative_strength.return_period", self.return_period)?;
        positive_period("relative_strength.sma_period", self.sma_period)?;
        if self.slope_window < 2 {
            return Err(ConfigError::invalid(
                "relative_strength.slope_window",
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RelativeStrengthGate {
    config: RelativeStrengthConfig,
}

struct StrengthInputs<'a> {
    config: &'a RelativeStrengthConfig,
    closes: Vec<f64>,
    index_closes: Vec<f64>,
}

impl RelativeStrengthGate {
    pub fn new(config: RelativeStrengthConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn evaluate(&self, ticker: &PriceSeries, index: &PriceSeries) -> GateResult {
        let inputs = StrengthInputs {
            config: &self.config,
            closes: ticker.closes(),
            index_closes: index.closes(),
        };
        let conditions = [
            outperforms_index as Condition<_>,
            close_above_sma as Condition<_>,
            sma_not_declining as Condition<_>,
        ];
        run_conditions(GateId::RelativeStrength, &inputs, &conditions)
    }
}

fn outperforms_index(
    inputs: &StrengthInputs<'_>,
    details: &mut GateDetails,
) -> Result<(), FailReason> {
    let period = inputs.config.return_period;
    let ticker_return = pct_change(&inputs.closes, period)?;
    let index_return = pct_change(&inputs.index_closes, period)?;
    let spread = ticker_return - index_return;
    record_number(details, "ticker_return_pct", ticker_return);
    record_number(details, "index_return_pct", index_return);
    record_number(details, "relative_strength_pct", spread);
    if ticker_return <= index_return {
        return Err(FailReason::new(
            FailKind::Underperforming,
            format!(
                "underperforming index over {period} days ({ticker_return:.1}% vs {index_return:.1}%)"
            ),
        ));
    }
    Ok(())
}

fn close_above_sma(inputs: &StrengthInputs<'_>, details: &mut GateDetails) -> Result<(), FailReason> {
    let average = sma(&inputs.closes, inputs.config.sma_period)?;
    let close = inputs.closes[inputs.closes.len() - 1];
    record_number(details, "close", close);
    record_number(details, "sma", average);
    record_flag(details, "above_sma", close > average);
    if close <= average {
        return Err(FailReason::new(
            FailKind::CloseBelowSma,
            format!(
                "close below {}-SMA ({close:.2} <= {average:.2})",
                inputs.config.sma_period
            ),
        ));
    }
    Ok(())
}

fn sma_not_declining(
    inputs: &StrengthInputs<'_>,
    details: &mut GateDetails,
) -> Result<(), FailReason> {
    let slope = sma_slope(
        &inputs.closes,
        inputs.config.sma_period,
        inputs.config.slope_window,
    )?;
    record_number(details, "sma_slope", slope);
    if slope < 0.0 {
        return Err(FailReason::new(
            FailKind::SmaDeclining,
            format!(
                "{}-SMA declining (slope {slope:.4})",
                inputs.config.sma_period
            ),
        ));
    }
    Ok(())
}
