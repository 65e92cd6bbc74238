//! Failure-mode monitor.
//!
//! Four independent detectors run every cycle, each yielding zero or one
//! alert (the per-ticker detector yields at most one per ticker). They run
//! regardless of gate outcomes: gates decide eligibility, the monitor
//! overrides it.
//!
//! Per-ticker work ([`FailureMonitor::check_ticker`]) has no cross-ticker
//! dependency and may run in parallel. The correlated-breakdown detector
//! needs every ticker's SMA status, so it runs in [`FailureMonitor::finish`]
//! after all per-ticker checks are in.

pub mod alert;

pub use alert::{AlertAction, FailureAlert, FailureMode, Severity, SkippedDetector};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{finite, positive, positive_period, ConfigError};
use crate::domain::PriceSeries;
use crate::gates::{record, record_flag, record_number, DetailValue, GateDetails};
use crate::indicators::{
    down_day_volume_rising, has_lower_low, n_day_return, pct_change, sma, sma_slope,
    IndicatorError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sma_period: usize,
    /// Volatility-index change that counts as a spike, in percent.
    pub vix_spike_threshold_pct: f64,
    pub vix_change_period: usize,
    /// Also treat a falling index SMA or an index lower low as a regime transition.
    pub include_trend_breaks: bool,
    pub lower_low_lookback: usize,
    pub rs_return_period: usize,
    /// Fraction of tickers below their SMA that triggers a correlated breakdown.
    pub correlated_threshold: f64,
    pub vix_sma_period: usize,
    /// How many recent index down days the volume trend looks at.
    pub red_day_sample: usize,
    pub red_day_min_history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sma_period: 50,
            vix_spike_threshold_pct: 15.0,
            vix_change_period: 5,
            include_trend_breaks: false,
            lower_low_lookback: 20,
            rs_return_period: 10,
            correlated_threshold: 0.40,
            vix_sma_period: 20,
            red_day_sample: 5,
            red_day_min_history: 10,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_period("monitor.sma_period", self.sma_period)?;
        finite("monitor.vix_spike_threshold_pct", self.vix_spike_threshold_pct)?;
        positive_period("monitor.vix_change_period", self.vix_change_period)?;
        if self.lower_low_lookback < 3 {
            return Err(ConfigError::invalid(
                "monitor.lower_low_lookback",
                "must be at least 3",
            ));
        }
        positive_period("monitor.rs_return_period", self.rs_return_period)?;
        positive("monitor.correlated_threshold", self.correlated_threshold)?;
        if self.correlated_threshold > 1.0 {
            return Err(ConfigError::invalid(
                "monitor.correlated_threshold",
                "is a fraction and must be at most 1.0",
            ));
        }
        positive_period("monitor.vix_sma_period", self.vix_sma_period)?;
        if self.red_day_sample < 2 {
            return Err(ConfigError::invalid(
                "monitor.red_day_sample",
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

/// Whether one ticker closed below its own SMA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmaStatus {
    pub ticker: String,
    pub below_sma: bool,
}

/// Per-ticker monitor output, gathered before the cross-sectional pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerCheck {
    pub ticker: String,
    /// `None` when the series is too short to judge.
    pub sma_status: Option<SmaStatus>,
    pub alert: Option<FailureAlert>,
    pub skipped: Option<SkippedDetector>,
}

/// Everything the monitor produced this cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub alerts: Vec<FailureAlert>,
    pub skipped: Vec<SkippedDetector>,
}

#[derive(Debug, Clone)]
pub struct FailureMonitor {
    config: MonitorConfig,
}

impl FailureMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run every detector over one cycle's inputs, sequentially.
    pub fn run(
        &self,
        index: &PriceSeries,
        volatility: &PriceSeries,
        tickers: &[(&str, &PriceSeries)],
    ) -> MonitorReport {
        let checks = tickers
            .iter()
            .map(|(ticker, series)| self.check_ticker(ticker, series, index))
            .collect();
        self.finish(index, volatility, checks)
    }

    /// Per-ticker work: relative-strength breakdown plus the SMA status the
    /// correlated-breakdown detector needs.
    pub fn check_ticker(&self, ticker: &str, series: &PriceSeries, index: &PriceSeries) -> TickerCheck {
        let sma_status = self.sma_status(ticker, series).ok();
        let (alert, skipped) = match self.relative_strength_breakdown(ticker, series, index) {
            Ok(alert) => (alert, None),
            Err(err) => (
                None,
                Some(SkippedDetector {
                    mode: FailureMode::RelativeStrengthBreakdown,
                    ticker: Some(ticker.to_string()),
                    reason: err.to_string(),
                }),
            ),
        };
        TickerCheck {
            ticker: ticker.to_string(),
            sma_status,
            alert,
            skipped,
        }
    }

    /// Run the global detectors and fold in the per-ticker checks.
    ///
    /// Alerts come out in detector order: regime transition, relative-strength
    /// breakdowns in ticker order, correlated breakdown, volatility expansion.
    pub fn finish(
        &self,
        index: &PriceSeries,
        volatility: &PriceSeries,
        checks: Vec<TickerCheck>,
    ) -> MonitorReport {
        let mut report = MonitorReport::default();
        let ticker_count = checks.len();

        let regime = self.regime_transition(index, volatility);
        report.absorb(FailureMode::RegimeTransition, regime);

        let mut statuses = Vec::with_capacity(checks.len());
        for check in checks {
            if let Some(alert) = check.alert {
                report.alerts.push(alert);
            }
            if let Some(skipped) = check.skipped {
                report.skip(skipped);
            }
            if let Some(status) = check.sma_status {
                statuses.push(status);
            }
            // Unjudgeable tickers drop out of the breadth count.
        }
        if statuses.is_empty() && ticker_count > 0 {
            report.skip(SkippedDetector {
                mode: FailureMode::CorrelatedBreakdown,
                ticker: None,
                reason: "no ticker has enough history for its SMA".to_string(),
            });
        } else if let Some(alert) = self.correlated_breakdown(&statuses) {
            report.alerts.push(alert);
        }

        let expansion = self.volatility_expansion(index, volatility);
        report.absorb(FailureMode::VolatilityExpansion, expansion);
        report
    }

    /// CRITICAL when the index closes below its SMA or the volatility index
    /// spikes past the threshold.
    ///
    /// Each trigger is judged on its own; one that lacks data is recorded as
    /// skipped and the other still decides. The detector errors only when no
    /// primary trigger can be computed.
    pub fn regime_transition(
        &self,
        index: &PriceSeries,
        volatility: &PriceSeries,
    ) -> Result<Option<FailureAlert>, IndicatorError> {
        let cfg = &self.config;
        let closes = index.closes();
        let index_side = sma(&closes, cfg.sma_period).map(|avg| (closes[closes.len() - 1], avg));
        let vix_side = pct_change(&volatility.closes(), cfg.vix_change_period);
        if let (Err(err), Err(_)) = (&index_side, &vix_side) {
            return Err(err.clone());
        }

        let mut details = GateDetails::new();
        let mut triggers = Vec::new();
        match index_side {
            Ok((close, index_sma)) => {
                let below_sma = close < index_sma;
                record_number(&mut details, "index_close", close);
                record_number(&mut details, "index_sma", index_sma);
                record_flag(&mut details, "below_sma", below_sma);
                if below_sma {
                    triggers.push(format!(
                        "index below {}-SMA ({close:.2} < {index_sma:.2})",
                        cfg.sma_period
                    ));
                }
            }
            Err(err) => record(&mut details, "below_sma", DetailValue::skipped(err.to_string())),
        }
        match vix_side {
            Ok(vix_change) => {
                let vix_spiking = vix_change > cfg.vix_spike_threshold_pct;
                record_number(&mut details, "vix_change_pct", vix_change);
                record_flag(&mut details, "vix_spiking", vix_spiking);
                if vix_spiking {
                    triggers.push(format!(
                        "volatility index spiking ({vix_change:+.1}% in {} days)",
                        cfg.vix_change_period
                    ));
                }
            }
            Err(err) => record(&mut details, "vix_spiking", DetailValue::skipped(err.to_string())),
        }

        if cfg.include_trend_breaks {
            match sma_slope(&closes, cfg.sma_period, 2) {
                Ok(slope) => {
                    record_number(&mut details, "sma_slope", slope);
                    if slope < 0.0 {
                        triggers.push(format!("{}-SMA turning down (slope {slope:.2})", cfg.sma_period));
                    }
                }
                Err(err) => record(&mut details, "sma_slope", DetailValue::skipped(err.to_string())),
            }
            match has_lower_low(&index.lows(), cfg.lower_low_lookback) {
                Ok(lower_low) => {
                    record_flag(&mut details, "lower_low", lower_low);
                    if lower_low {
                        triggers.push("index made a lower low".to_string());
                    }
                }
                Err(err) => record(&mut details, "lower_low", DetailValue::skipped(err.to_string())),
            }
        }

        if triggers.is_empty() {
            return Ok(None);
        }
        Ok(Some(FailureAlert::new(
            FailureMode::RegimeTransition,
            format!("regime transition: {}", triggers.join("; ")),
            details,
        )))
    }

    /// WARNING for a ticker that both lags the index and sits below its SMA.
    pub fn relative_strength_breakdown(
        &self,
        ticker: &str,
        series: &PriceSeries,
        index: &PriceSeries,
    ) -> Result<Option<FailureAlert>, IndicatorError> {
        let cfg = &self.config;
        let closes = series.closes();
        let ticker_return = n_day_return(&closes, cfg.rs_return_period)? * 100.0;
        let index_return = n_day_return(&index.closes(), cfg.rs_return_period)? * 100.0;
        let ticker_sma = sma(&closes, cfg.sma_period)?;
        let close = closes[closes.len() - 1];

        let underperforming = ticker_return < index_return;
        let below_sma = close < ticker_sma;
        if !(underperforming && below_sma) {
            return Ok(None);
        }
        let mut details = GateDetails::new();
        record_number(&mut details, "ticker_return_pct", ticker_return);
        record_number(&mut details, "index_return_pct", index_return);
        record_number(&mut details, "close", close);
        record_number(&mut details, "sma", ticker_sma);
        let message = format!(
            "{ticker} lagging index ({ticker_return:.1}% vs {index_return:.1}% over {} days) \
             and below {}-SMA ({close:.2} < {ticker_sma:.2})",
            cfg.rs_return_period, cfg.sma_period
        );
        Ok(Some(
            FailureAlert::new(FailureMode::RelativeStrengthBreakdown, message, details)
                .for_ticker(ticker),
        ))
    }

    pub fn sma_status(&self, ticker: &str, series: &PriceSeries) -> Result<SmaStatus, IndicatorError> {
        let closes = series.closes();
        let ticker_sma = sma(&closes, self.config.sma_period)?;
        Ok(SmaStatus {
            ticker: ticker.to_string(),
            below_sma: closes[closes.len() - 1] < ticker_sma,
        })
    }

    /// HIGH when the fraction of tickers below their own SMA strictly exceeds
    /// the threshold. Only tickers with a status count toward the total.
    pub fn correlated_breakdown(&self, statuses: &[SmaStatus]) -> Option<FailureAlert> {
        if statuses.is_empty() {
            return None;
        }
        let below: Vec<&str> = statuses
            .iter()
            .filter(|s| s.below_sma)
            .map(|s| s.ticker.as_str())
            .collect();
        let fraction = below.len() as f64 / statuses.len() as f64;
        let threshold = self.config.correlated_threshold;
        if fraction <= threshold {
            return None;
        }
        let mut details = GateDetails::new();
        record_number(&mut details, "total_tickers", statuses.len() as f64);
        record_number(&mut details, "below_sma", below.len() as f64);
        record_number(&mut details, "breakdown_pct", fraction * 100.0);
        record_number(&mut details, "threshold_pct", threshold * 100.0);
        record(&mut details, "breakdown_tickers", DetailValue::Text(below.join(",")));
        let message = format!(
            "correlated breakdown: {}/{} tickers ({:.1}%) below {}-SMA (threshold {:.0}%)",
            below.len(),
            statuses.len(),
            fraction * 100.0,
            self.config.sma_period,
            threshold * 100.0
        );
        Some(FailureAlert::new(FailureMode::CorrelatedBreakdown, message, details))
    }

    /// WARNING when the volatility index is above its own SMA and volume on
    /// recent index down days is rising.
    pub fn volatility_expansion(
        &self,
        index: &PriceSeries,
        volatility: &PriceSeries,
    ) -> Result<Option<FailureAlert>, IndicatorError> {
        let cfg = &self.config;
        let vix_closes = volatility.closes();
        let vix_sma = sma(&vix_closes, cfg.vix_sma_period)?;
        let vix_close = vix_closes[vix_closes.len() - 1];
        let elevated = vix_close > vix_sma;
        let volume_rising =
            down_day_volume_rising(index, cfg.red_day_sample, cfg.red_day_min_history)?;
        if !(elevated && volume_rising) {
            return Ok(None);
        }
        let mut details = GateDetails::new();
        record_number(&mut details, "vix_close", vix_close);
        record_number(&mut details, "vix_sma", vix_sma);
        record_flag(&mut details, "red_day_volume_rising", volume_rising);
        let message = format!(
            "volatility expansion: volatility index elevated ({vix_close:.2} > {}-SMA {vix_sma:.2}) \
             with rising volume on index down days",
            cfg.vix_sma_period
        );
        Ok(Some(FailureAlert::new(FailureMode::VolatilityExpansion, message, details)))
    }
}

impl MonitorReport {
    pub fn has_severity(&self, severity: Severity) -> bool {
        self.alerts.iter().any(|a| a.severity == severity)
    }

    /// Tickers named by a remove-ticker alert.
    pub fn removed_tickers(&self) -> impl Iterator<Item = &str> {
        self.alerts.iter().filter_map(FailureAlert::removes)
    }

    fn absorb(
        &mut self,
        mode: FailureMode,
        outcome: Result<Option<FailureAlert>, IndicatorError>,
    ) {
        match outcome {
            Ok(Some(alert)) => self.alerts.push(alert),
            Ok(None) => {}
            Err(err) => self.skip(SkippedDetector {
                mode,
                ticker: None,
                reason: err.to_string(),
            }),
        }
    }

    fn skip(&mut self, skipped: SkippedDetector) {
        warn!(
            mode = %skipped.mode,
            ticker = skipped.ticker.as_deref().unwrap_or("-"),
            reason = %skipped.reason,
            "failure detector skipped"
        );
        self.skipped.push(skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::indicators::make_series;
    use chrono::NaiveDate;

    fn monitor() -> FailureMonitor {
        FailureMonitor::new(MonitorConfig::default()).unwrap()
    }

    fn rising(n: usize) -> PriceSeries {
        make_series(&(0..n).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    fn falling(n: usize) -> PriceSeries {
        make_series(&(0..n).map(|i| 200.0 - i as f64).collect::<Vec<_>>())
    }

    fn flat(n: usize, value: f64) -> PriceSeries {
        make_series(&vec![value; n])
    }

    fn with_last(values: &[f64], last: f64) -> PriceSeries {
        let mut values = values.to_vec();
        if let Some(v) = values.last_mut() {
            *v = last;
        }
        make_series(&values)
    }

    fn custom(closes: &[f64], lows: &[f64], volumes: &[u64]) -> PriceSeries {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = closes
            .iter()
            .zip(lows)
            .zip(volumes)
            .enumerate()
            .map(|(i, ((&close, &low), &volume))| Bar {
                date: base + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low,
                close,
                volume,
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    // ── regime transition ──

    #[test]
    fn healthy_market_has_no_regime_alert() {
        let alert = monitor()
            .regime_transition(&rising(60), &flat(30, 20.0))
            .unwrap();
        assert!(alert.is_none());
    }

    #[test]
    fn index_below_sma_is_critical() {
        let alert = monitor()
            .regime_transition(&falling(60), &flat(30, 20.0))
            .unwrap()
            .unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.action, AlertAction::DisableNewEntries);
        assert!(alert.message.contains("below 50-SMA"));
    }

    #[test]
    fn volatility_spike_alone_triggers() {
        let vix = with_last(&[20.0; 30], 24.0);
        let alert = monitor()
            .regime_transition(&rising(60), &vix)
            .unwrap()
            .unwrap();
        assert!(alert.message.contains("spiking"));
    }

    #[test]
    fn spike_at_threshold_does_not_trigger() {
        let vix = with_last(&[20.0; 30], 23.0);
        assert!(monitor()
            .regime_transition(&rising(60), &vix)
            .unwrap()
            .is_none());
    }

    #[test]
    fn lower_low_only_counts_with_trend_breaks_enabled() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let mut lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        lows[50] = 120.0;
        lows[55] = 110.0;
        let index = custom(&closes, &lows, &[1000; 60]);
        let vix = flat(30, 20.0);

        assert!(monitor().regime_transition(&index, &vix).unwrap().is_none());

        let strict = FailureMonitor::new(MonitorConfig {
            include_trend_breaks: true,
            ..Default::default()
        })
        .unwrap();
        let alert = strict.regime_transition(&index, &vix).unwrap().unwrap();
        assert!(alert.message.contains("lower low"));
    }

    // ── relative strength breakdown ──

    #[test]
    fn lagging_ticker_below_sma_is_flagged() {
        let alert = monitor()
            .relative_strength_breakdown("WEAK", &falling(60), &rising(60))
            .unwrap()
            .unwrap();
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.removes(), Some("WEAK"));
    }

    #[test]
    fn strong_ticker_is_not_flagged() {
        let alert = monitor()
            .relative_strength_breakdown("STRONG", &rising(60), &falling(60))
            .unwrap();
        assert!(alert.is_none());
    }

    #[test]
    fn short_ticker_history_is_skipped() {
        let check = monitor().check_ticker("NEW", &rising(8), &rising(60));
        assert!(check.alert.is_none());
        assert!(check.sma_status.is_none());
        let skipped = check.skipped.unwrap();
        assert_eq!(skipped.mode, FailureMode::RelativeStrengthBreakdown);
        assert_eq!(skipped.ticker.as_deref(), Some("NEW"));
    }

    // ── correlated breakdown ──

    fn statuses(below: usize, total: usize) -> Vec<SmaStatus> {
        (0..total)
            .map(|i| SmaStatus {
                ticker: format!("T{i:02}"),
                below_sma: i < below,
            })
            .collect()
    }

    #[test]
    fn breadth_above_threshold_is_high() {
        let alert = monitor().correlated_breakdown(&statuses(9, 20)).unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.action, AlertAction::ReduceGlobalRisk);
        assert_eq!(
            alert.details.get("breakdown_pct").and_then(DetailValue::as_number),
            Some(45.0)
        );
    }

    #[test]
    fn breadth_at_threshold_does_not_trigger() {
        assert!(monitor().correlated_breakdown(&statuses(8, 20)).is_none());
    }

    #[test]
    fn no_statuses_no_alert() {
        assert!(monitor().correlated_breakdown(&[]).is_none());
    }

    // ── volatility expansion ──

    fn choppy_index(volume_step: u64) -> PriceSeries {
        let closes: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        let volumes: Vec<u64> = (0..20).map(|i| 1000 + volume_step * i).collect();
        custom(&closes, &lows, &volumes)
    }

    #[test]
    fn elevated_vix_with_rising_red_day_volume_warns() {
        let vix = with_last(&[20.0; 30], 22.0);
        let alert = monitor()
            .volatility_expansion(&choppy_index(100), &vix)
            .unwrap()
            .unwrap();
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.action, AlertAction::Warn);
    }

    #[test]
    fn flat_red_day_volume_does_not_warn() {
        let vix = with_last(&[20.0; 30], 22.0);
        assert!(monitor()
            .volatility_expansion(&choppy_index(0), &vix)
            .unwrap()
            .is_none());
    }

    // ── full cycle ──

    #[test]
    fn run_orders_alerts_by_detector() {
        let index = rising(60);
        let vix = with_last(&[20.0; 30], 30.0);
        let weak = falling(60);
        let report = monitor().run(&index, &vix, &[("WEAK", &weak)]);
        let modes: Vec<FailureMode> = report.alerts.iter().map(|a| a.mode).collect();
        assert_eq!(
            modes,
            vec![
                FailureMode::RegimeTransition,
                FailureMode::RelativeStrengthBreakdown,
                FailureMode::CorrelatedBreakdown,
            ]
        );
        assert!(report.has_severity(Severity::Critical));
        assert_eq!(report.removed_tickers().collect::<Vec<_>>(), vec!["WEAK"]);
    }

    #[test]
    fn short_volatility_series_skips_only_the_vix_trigger() {
        let report = monitor().run(&rising(60), &flat(3, 20.0), &[]);
        assert!(report.alerts.is_empty());
        let skipped: Vec<FailureMode> = report.skipped.iter().map(|s| s.mode).collect();
        assert_eq!(skipped, vec![FailureMode::VolatilityExpansion]);
    }

    #[test]
    fn index_below_sma_alerts_even_with_short_volatility_series() {
        let alert = monitor()
            .regime_transition(&falling(60), &flat(3, 20.0))
            .unwrap()
            .expect("index trigger still fires");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.details["below_sma"], DetailValue::Flag(true));
        assert!(alert.details["vix_spiking"].is_skipped());
    }

    #[test]
    fn volatility_spike_alerts_even_with_short_index() {
        let vix = with_last(&[20.0; 30], 30.0);
        let alert = monitor()
            .regime_transition(&rising(10), &vix)
            .unwrap()
            .expect("vix trigger still fires");
        assert!(alert.details["below_sma"].is_skipped());
        assert_eq!(alert.details["vix_spiking"], DetailValue::Flag(true));
    }

    #[test]
    fn regime_detector_skipped_when_neither_trigger_computes() {
        let report = monitor().run(&rising(10), &flat(3, 20.0), &[]);
        assert!(report.alerts.is_empty());
        assert!(report
            .skipped
            .iter()
            .any(|s| s.mode == FailureMode::RegimeTransition));
    }

    #[test]
    fn correlated_breakdown_skipped_when_no_ticker_is_judgeable() {
        let short = rising(5);
        let report = monitor().run(&rising(60), &flat(30, 20.0), &[("NEW", &short)]);
        assert!(report
            .skipped
            .iter()
            .any(|s| s.mode == FailureMode::CorrelatedBreakdown));
    }

    #[test]
    fn threshold_must_be_a_fraction() {
        for bad in [0.0, 1.5] {
            let config = MonitorConfig {
                correlated_threshold: bad,
                ..Default::default()
            };
            assert!(FailureMonitor::new(config).is_err());
        }
    }
}
