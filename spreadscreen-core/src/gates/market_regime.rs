//! Gate 1 — market regime.
//!
//! Judges broad-market health from the index and the volatility index.
//! Conditions, in order:
//! 1. index close above its SMA
//! 2. SMA slope non-negative
//! 3. no lower low in the trailing window
//! 4. volatility-index N-day change at or below the threshold

use serde::{Deserialize, Serialize};

use crate::config::{finite, positive_period, ConfigError};
use crate::domain::PriceSeries;
use crate::indicators::{has_lower_low, pct_change, sma, sma_slope};

use super::{
    record_flag, record_number, run_conditions, Condition, FailKind, FailReason, GateDetails,
    GateId, GateResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketRegimeConfig {
    pub sma_period: usize,
    /// Number of trailing SMA values the slope is fitted over.
    pub slope_window: usize,
    pub lower_low_lookback: usize,
    pub vix_change_period: usize,
    /// Maximum volatility-index change, in percent.
    pub vix_change_threshold_pct: f64,
}

impl Default for MarketRegimeConfig {
    fn default() -> Self {
        Self {
            sma_period: 50,
            slope_window: 2,
            lower_low_lookback: 20,
            vix_change_period: 5,
            vix_change_threshold_pct: 10.0,
        }
    }
}

impl MarketRegimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_period("market_regime.sma_period", self.sma_period)?;
        if self.slope_window < 2 {
            return Err(ConfigError::invalid(
                "market_regime.slope_window",
                "must be at least 2",
            ));
        }
        if self.lower_low_lookback < 3 {
            return Err(ConfigError::invalid(
                "market_regime.lower_low_lookback",
                "must be at least 3",
            ));
        }
        positive_period("market_regime.vix_change_period", self.vix_change_period)?;
        finite(
            "market_regime.vix_change_threshold_pct",
            self.vix_change_threshold_pct,
        )
    }
}

/// Gate 1 evaluator. Runs once per cycle, shared by all tickers.
#[derive(Debug, Clone)]
pub struct MarketRegimeGate {
    config: MarketRegimeConfig,
}

struct RegimeInputs<'a> {
    config: &'a MarketRegimeConfig,
    closes: Vec<f64>,
    lows: Vec<f64>,
    volatility_closes: Vec<f64>,
}

impl MarketRegimeGate {
    pub fn new(config: MarketRegimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MarketRegimeConfig {
        &self.config
    }

    pub fn evaluate(&self, index: &PriceSeries, volatility: &PriceSeries) -> GateResult {
        let inputs = RegimeInputs {
            config: &self.config,
            closes: index.closes(),
            lows: index.lows(),
            volatility_closes: volatility.closes(),
        };
        let conditions = [
            close_above_sma as Condition<_>,
            sma_not_declining as Condition<_>,
            no_lower_low as Condition<_>,
            volatility_contained as Condition<_>,
        ];
        run_conditions(GateId::MarketRegime, &inputs, &conditions)
    }
}

fn close_above_sma(inputs: &RegimeInputs<'_>, details: &mut GateDetails) -> Result<(), FailReason> {
    let average = sma(&inputs.closes, inputs.config.sma_period)?;
    let close = inputs.closes[inputs.closes.len() - 1];
    record_number(details, "index_close", close);
    record_number(details, "index_sma", average);
    let above = close > average;
    record_flag(details, "above_sma", above);
    if !above {
        return Err(FailReason::new(
            FailKind::CloseBelowSma,
            format!(
                "index close below {}-SMA ({close:.2} <= {average:.2})",
                inputs.config.sma_period
            ),
        ));
    }
    Ok(())
}

fn sma_not_declining(
    inputs: &RegimeInputs<'_>,
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

fn no_lower_low(inputs: &RegimeInputs<'_>, details: &mut GateDetails) -> Result<(), FailReason> {
    let lower_low = has_lower_low(&inputs.lows, inputs.config.lower_low_lookback)?;
    record_flag(details, "lower_low", lower_low);
    if lower_low {
        return Err(FailReason::new(
            FailKind::LowerLow,
            format!(
                "lower low in last {} days",
                inputs.config.lower_low_lookback
            ),
        ));
    }
    Ok(())
}

fn volatility_contained(
    inputs: &RegimeInputs<'_>,
    details: &mut GateDetails,
) -> Result<(), FailReason> {
    let change = pct_change(&inputs.volatility_closes, inputs.config.vix_change_period)?;
    record_number(details, "vix_change_pct", change);
    if change > inputs.config.vix_change_threshold_pct {
        return Err(FailReason::new(
            FailKind::VolatilitySpike,
            format!(
                "volatility index up {change:.1}% in {} days (limit {:.1}%)",
                inputs.config.vix_change_period, inputs.config.vix_change_threshold_pct
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::indicators::make_series;
    use chrono::NaiveDate;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    fn with_lows(closes: &[f64], lows: &[f64]) -> PriceSeries {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = closes
            .iter()
            .zip(lows)
            .enumerate()
            .map(|(i, (&close, &low))| Bar {
                date: base + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low,
                close,
                volume: 1000,
            })
            .collect();
        PriceSeries::new("INDEX", bars).unwrap()
    }

    fn calm_vix() -> PriceSeries {
        make_series(&[20.0; 10])
    }

    fn gate() -> MarketRegimeGate {
        MarketRegimeGate::new(MarketRegimeConfig::default()).unwrap()
    }

    #[test]
    fn healthy_uptrend_passes() {
        let result = gate().evaluate(&make_series(&rising(80)), &calm_vix());
        assert!(result.passed(), "{:?}", result.reason());
        assert_eq!(result.detail_number("vix_change_pct"), Some(0.0));
    }

    #[test]
    fn vix_spike_fails_last() {
        let mut vix = vec![20.0; 10];
        vix[9] = 23.0; // +15%
        let result = gate().evaluate(&make_series(&rising(80)), &make_series(&vix));
        assert_eq!(result.fail_kind(), Some(FailKind::VolatilitySpike));
        assert_eq!(result.detail("above_sma").and_then(|v| v.as_flag()), Some(true));
    }

    #[test]
    fn short_index_reports_insufficient_data() {
        let result = gate().evaluate(&make_series(&rising(30)), &calm_vix());
        assert_eq!(result.fail_kind(), Some(FailKind::InsufficientData));
    }

    #[test]
    fn short_vix_reports_insufficient_data() {
        let result = gate().evaluate(&make_series(&rising(80)), &make_series(&[20.0; 3]));
        assert_eq!(result.fail_kind(), Some(FailKind::InsufficientData));
    }

    #[test]
    fn declining_sma_fails_second() {
        // long decline then a pop above the SMA; the bar leaving the window
        // (171) is still above today's close, so the average keeps falling
        let mut closes: Vec<f64> = (0..79).map(|i| 200.0 - i as f64).collect();
        closes.push(160.0);
        let result = gate().evaluate(&make_series(&closes), &calm_vix());
        assert_eq!(result.fail_kind(), Some(FailKind::SmaDeclining));
        assert_eq!(result.detail("above_sma").and_then(|v| v.as_flag()), Some(true));
        let slope = result.detail_number("sma_slope").unwrap();
        assert!((slope + 0.22).abs() < 1e-9, "slope {slope}");
    }

    #[test]
    fn lower_low_fails_third() {
        let closes = rising(80);
        let mut lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        lows[66] = closes[66] - 6.0; // 127.0
        lows[73] = closes[73] - 10.0; // 126.5
        let result = gate().evaluate(&with_lows(&closes, &lows), &calm_vix());
        assert_eq!(result.fail_kind(), Some(FailKind::LowerLow));
        assert_eq!(result.detail("lower_low").and_then(|v| v.as_flag()), Some(true));
        assert!(result.detail_number("sma_slope").unwrap() > 0.0);
    }

    #[test]
    fn higher_swing_low_passes() {
        let closes = rising(80);
        let mut lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        lows[66] = closes[66] - 10.0;
        lows[73] = closes[73] - 6.0;
        let result = gate().evaluate(&with_lows(&closes, &lows), &calm_vix());
        assert!(result.passed(), "{:?}", result.reason());
        assert_eq!(result.detail("lower_low").and_then(|v| v.as_flag()), Some(false));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MarketRegimeConfig {
            slope_window: 1,
            ..Default::default()
        };
        assert!(MarketRegimeGate::new(config).is_err());
    }
}
