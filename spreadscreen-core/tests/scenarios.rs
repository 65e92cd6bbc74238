//! Behavioural scenarios for the gates, the monitor, and system state.

mod common;

use common::{as_of, falling, rising, series, series_tracking_lows, volatility};
use spreadscreen_core::gates::{
    MarketRegimeConfig, MarketRegimeGate, StructuralSafetyConfig, StructuralSafetyGate,
    SupportLevels,
};
use spreadscreen_core::{
    FailKind, FailingStage, FailureMode, ScreenerConfig, Screener, ScreeningInput, Severity,
    SystemState, TickerInput,
};

fn regime_gate() -> MarketRegimeGate {
    MarketRegimeGate::new(MarketRegimeConfig::default()).unwrap()
}

// ── Gate 1 ───────────────────────────────────────────────────────────

/// Linear index ending at 100 whose 50-bar SMA is exactly 98.
fn index_close_100_sma_98() -> Vec<f64> {
    (0..60)
        .map(|i| 100.0 - (59 - i) as f64 * (2.0 / 24.5))
        .collect()
}

#[test]
fn healthy_index_with_mild_volatility_passes_gate_one() {
    let index = series("SPY", &index_close_100_sma_98());
    let vix = volatility(30, 20.0, 20.6);
    let result = regime_gate().evaluate(&index, &vix);

    assert!(result.passed(), "{:?}", result.reason());
    let close = result.detail_number("index_close").unwrap();
    let sma = result.detail_number("index_sma").unwrap();
    assert!((close - 100.0).abs() < 1e-9);
    assert!((sma - 98.0).abs() < 1e-9);
    assert!(result.detail_number("sma_slope").unwrap() >= 0.0);
    assert!((result.detail_number("vix_change_pct").unwrap() - 3.0).abs() < 1e-9);
}

#[test]
fn index_below_sma_fails_gate_one() {
    let flat = (4900.0 - 95.0) / 49.0;
    let mut closes = vec![flat; 59];
    closes.push(95.0);
    let index = series("SPY", &closes);
    let result = regime_gate().evaluate(&index, &volatility(30, 20.0, 20.0));

    assert_eq!(result.fail_kind(), Some(FailKind::CloseBelowSma));
    assert!((result.detail_number("index_sma").unwrap() - 98.0).abs() < 1e-9);
    assert!(result.reason().unwrap().message.contains("below"));
}

#[test]
fn gate_one_reports_first_failing_condition() {
    // Below the SMA and carrying a lower low in the last 20 bars.
    let mut closes: Vec<f64> = (0..50).map(|i| 150.0 - i as f64 * 0.2).collect();
    closes.extend([130.0, 134.0, 138.0, 126.0, 132.0, 136.0, 122.0, 128.0, 131.0, 129.0]);
    let index = series_tracking_lows("SPY", &closes);
    let lows = index.lows();
    assert!(spreadscreen_core::indicators::has_lower_low(&lows, 20).unwrap());

    let result = regime_gate().evaluate(&index, &volatility(30, 20.0, 20.0));
    assert_eq!(result.fail_kind(), Some(FailKind::CloseBelowSma));
    assert!(result.detail("lower_low").is_none());
}

// ── Gate 3 ───────────────────────────────────────────────────────────

#[test]
fn strike_must_clear_every_support_level() {
    let gate = StructuralSafetyGate::new(StructuralSafetyConfig::default()).unwrap();
    let levels = SupportLevels {
        current_price: 160.0,
        sma: 155.0,
        higher_low: Some(152.0),
        base_low: Some(153.0),
        atr: Some(6.0),
        atr_level: Some(151.0),
    };

    let at_150 = gate.judge(&levels, Some(150.0));
    assert!(!at_150.passed());
    assert_eq!(at_150.fail_kind(), Some(FailKind::StrikeAboveSupport));

    let at_149 = gate.judge(&levels, Some(149.0));
    assert!(at_149.passed(), "{:?}", at_149.reason());
    let max_safe = at_149.detail_number("max_safe_strike").unwrap();
    assert!(max_safe < 151.0);
    assert!(max_safe >= 149.0);
}

// ── Monitor and system state ─────────────────────────────────────────

fn input(tickers: Vec<TickerInput>, vix_last: f64) -> ScreeningInput {
    ScreeningInput {
        as_of: as_of(60),
        index: rising("SPY", 60, 0.1),
        volatility: volatility(30, 20.0, vix_last),
        tickers,
    }
}

#[test]
fn correlated_breakdown_reduces_risk() {
    let tickers = (0..20)
        .map(|i| {
            let symbol = format!("T{i:02}");
            let data = if i < 9 {
                falling(&symbol, 60)
            } else {
                rising(&symbol, 60, 1.0)
            };
            TickerInput::new(symbol, Some(data))
        })
        .collect();
    let screener = Screener::new(ScreenerConfig::default()).unwrap();
    let result = screener.screen(&input(tickers, 20.0));

    assert!(result.market_regime.passed());
    let alert = result
        .alerts
        .iter()
        .find(|a| a.mode == FailureMode::CorrelatedBreakdown)
        .expect("correlated breakdown alert");
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(result.system_state, SystemState::ReducedRisk);
    assert!(!result.allow_new_trades);
}

#[test]
fn breakdown_alert_removes_ticker_that_passed_gates() {
    // Strong over 30 days, weak over the last 10 and below its 20-SMA.
    let closes: Vec<f64> = (0..60)
        .map(|i| {
            if i < 50 {
                100.0 + i as f64 * 1.2
            } else {
                158.8 - (i - 49) as f64
            }
        })
        .collect();
    let mut config = ScreenerConfig::default();
    config.monitor.sma_period = 20;
    let screener = Screener::new(config).unwrap();
    let result = screener.screen(&input(
        vec![TickerInput::new("FADE", Some(series("FADE", &closes)))],
        20.0,
    ));

    assert!(!result.is_qualified("FADE"));
    let failed = result.failed("FADE").unwrap();
    assert_eq!(
        failed.failing_gate,
        FailingStage::Monitor(FailureMode::RelativeStrengthBreakdown)
    );
    // All three ticker gates were evaluated before the monitor stepped in.
    assert_eq!(failed.details.len(), 3);
}

#[test]
fn critical_alert_forces_risk_off_even_when_gate_one_passes() {
    let mut config = ScreenerConfig::default();
    config.market_regime.vix_change_threshold_pct = 20.0;
    let screener = Screener::new(config).unwrap();
    let tickers = vec![TickerInput::new("UP", Some(rising("UP", 60, 1.0)))];
    let result = screener.screen(&input(tickers, 23.2));

    assert!(result.market_regime.passed());
    assert!(result
        .alerts
        .iter()
        .any(|a| a.severity == Severity::Critical));
    assert_eq!(result.system_state, SystemState::RiskOff);
    assert!(!result.allow_new_trades);
}
