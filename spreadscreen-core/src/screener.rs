//! Screener orchestrator.
//!
//! One cycle walks `Start → Gate1 → TickerGates → Monitor → Aggregate → Done`.
//! Gate 1 runs once against the index. Each ticker then runs Gates 2–4 with
//! short-circuit, and the failure monitor runs over the same inputs. The
//! correlated-breakdown detector needs every ticker's SMA status, so the
//! monitor finishes only after the per-ticker pass.
//!
//! A failing Gate 1 never stops the per-ticker gates; their results are
//! still reported, but `allow_new_trades` is false for the whole cycle.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, info_span};

use crate::config::{ConfigError, ScreenerConfig};
use crate::domain::{OptionsSnapshot, PriceSeries};
use crate::gates::{
    EventVolatilityGate, FailKind, FailReason, GateDetails, GateId, GateResult, MarketRegimeGate,
    RelativeStrengthGate, StructuralSafetyGate,
};
use crate::monitor::{FailureAlert, FailureMode, FailureMonitor, SkippedDetector, TickerCheck};
use crate::state::{derive_system_state, SystemState};

/// One ticker's inputs for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerInput {
    pub ticker: String,
    /// `None` when the market-data provider had nothing for this ticker.
    pub series: Option<PriceSeries>,
    pub options: Option<OptionsSnapshot>,
    /// Strike to test in Gate 3; without one the maximum safe strike is tested.
    pub candidate_strike: Option<f64>,
}

impl TickerInput {
    pub fn new(ticker: impl Into<String>, series: Option<PriceSeries>) -> Self {
        Self {
            ticker: ticker.into(),
            series,
            options: None,
            candidate_strike: None,
        }
    }

    pub fn with_options(mut self, options: OptionsSnapshot) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_candidate_strike(mut self, strike: f64) -> Self {
        self.candidate_strike = Some(strike);
        self
    }
}

/// Everything one cycle consumes. All series arrive pre-fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningInput {
    pub as_of: NaiveDate,
    pub index: PriceSeries,
    pub volatility: PriceSeries,
    pub tickers: Vec<TickerInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningPhase {
    Start,
    Gate1,
    TickerGates,
    Monitor,
    Aggregate,
    Done,
}

impl fmt::Display for ScreeningPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "START",
            Self::Gate1 => "GATE1",
            Self::TickerGates => "TICKER_GATES",
            Self::Monitor => "MONITOR",
            Self::Aggregate => "AGGREGATE",
            Self::Done => "DONE",
        })
    }
}

/// Where a ticker dropped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "id", rename_all = "snake_case")]
pub enum FailingStage {
    /// No usable series.
    Data,
    Gate(GateId),
    /// Passed the gates but was removed by a monitor alert.
    Monitor(FailureMode),
}

impl fmt::Display for FailingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Gate(gate) => write!(f, "{gate}"),
            Self::Monitor(mode) => write!(f, "monitor ({mode})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedTicker {
    pub ticker: String,
    pub max_safe_strike: f64,
    /// How far the maximum safe strike sits below the close, in percent.
    pub discount_pct: f64,
    pub details: BTreeMap<GateId, GateDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTicker {
    pub ticker: String,
    pub failing_gate: FailingStage,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailKind>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<GateId, GateDetails>,
}

/// Output of one cycle. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub as_of: NaiveDate,
    pub system_state: SystemState,
    pub allow_new_trades: bool,
    pub market_regime: GateResult,
    pub qualified_tickers: Vec<QualifiedTicker>,
    pub failed_tickers: Vec<FailedTicker>,
    pub alerts: Vec<FailureAlert>,
    #[serde(default)]
    pub skipped_detectors: Vec<SkippedDetector>,
}

impl ScreeningResult {
    pub fn qualified(&self, ticker: &str) -> Option<&QualifiedTicker> {
        self.qualified_tickers.iter().find(|q| q.ticker == ticker)
    }

    pub fn failed(&self, ticker: &str) -> Option<&FailedTicker> {
        self.failed_tickers.iter().find(|f| f.ticker == ticker)
    }

    pub fn is_qualified(&self, ticker: &str) -> bool {
        self.qualified(ticker).is_some()
    }
}

enum Verdict {
    Qualified(QualifiedTicker),
    Failed(FailedTicker),
}

struct TickerEvaluation {
    verdict: Verdict,
    check: Option<TickerCheck>,
}

/// Runs screening cycles. Construction validates the whole config; a built
/// screener cannot hit a configuration error mid-cycle.
#[derive(Debug, Clone)]
pub struct Screener {
    parallel_tickers: bool,
    market_regime: MarketRegimeGate,
    relative_strength: RelativeStrengthGate,
    structural_safety: StructuralSafetyGate,
    event_volatility: EventVolatilityGate,
    monitor: FailureMonitor,
}

impl Screener {
    pub fn new(config: ScreenerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            parallel_tickers: config.parallel_tickers,
            market_regime: MarketRegimeGate::new(config.market_regime)?,
            relative_strength: RelativeStrengthGate::new(config.relative_strength)?,
            structural_safety: StructuralSafetyGate::new(config.structural_safety)?,
            event_volatility: EventVolatilityGate::new(config.event_volatility)?,
            monitor: FailureMonitor::new(config.monitor)?,
        })
    }

    pub fn structural_safety(&self) -> &StructuralSafetyGate {
        &self.structural_safety
    }

    pub fn screen(&self, input: &ScreeningInput) -> ScreeningResult {
        let span = info_span!("screen", as_of = %input.as_of, tickers = input.tickers.len());
        let _guard = span.enter();
        phase(ScreeningPhase::Start);

        phase(ScreeningPhase::Gate1);
        let market_regime = self.market_regime.evaluate(&input.index, &input.volatility);
        if let Some(reason) = market_regime.reason() {
            info!(%reason, "market regime failed; new trades disabled for this cycle");
        }

        phase(ScreeningPhase::TickerGates);
        let evaluations: Vec<TickerEvaluation> = if self.parallel_tickers {
            input
                .tickers
                .par_iter()
                .map(|t| self.evaluate_ticker(t, input))
                .collect()
        } else {
            input
                .tickers
                .iter()
                .map(|t| self.evaluate_ticker(t, input))
                .collect()
        };

        phase(ScreeningPhase::Monitor);
        let mut verdicts = Vec::with_capacity(evaluations.len());
        let mut checks = Vec::with_capacity(evaluations.len());
        for evaluation in evaluations {
            verdicts.push(evaluation.verdict);
            checks.extend(evaluation.check);
        }
        let report = self.monitor.finish(&input.index, &input.volatility, checks);

        phase(ScreeningPhase::Aggregate);
        let removals: BTreeMap<&str, &FailureAlert> = report
            .alerts
            .iter()
            .filter_map(|alert| alert.removes().map(|ticker| (ticker, alert)))
            .collect();
        let mut qualified_tickers = Vec::new();
        let mut failed_tickers = Vec::new();
        for verdict in verdicts {
            match verdict {
                Verdict::Qualified(q) => match removals.get(q.ticker.as_str()) {
                    Some(alert) => failed_tickers.push(FailedTicker {
                        ticker: q.ticker,
                        failing_gate: FailingStage::Monitor(alert.mode),
                        reason: alert.message.clone(),
                        kind: None,
                        details: q.details,
                    }),
                    None => qualified_tickers.push(q),
                },
                Verdict::Failed(f) => failed_tickers.push(f),
            }
        }
        let system_state = derive_system_state(&market_regime, &report.alerts);

        phase(ScreeningPhase::Done);
        info!(
            state = %system_state,
            qualified = qualified_tickers.len(),
            failed = failed_tickers.len(),
            alerts = report.alerts.len(),
            "screening cycle complete"
        );
        ScreeningResult {
            as_of: input.as_of,
            system_state,
            allow_new_trades: system_state.allows_new_trades(),
            market_regime,
            qualified_tickers,
            failed_tickers,
            alerts: report.alerts,
            skipped_detectors: report.skipped,
        }
    }

    fn evaluate_ticker(&self, ticker: &TickerInput, input: &ScreeningInput) -> TickerEvaluation {
        let Some(series) = ticker.series.as_ref().filter(|s| !s.is_empty()) else {
            debug!(ticker = %ticker.ticker, "no price data");
            return TickerEvaluation {
                verdict: Verdict::Failed(FailedTicker {
                    ticker: ticker.ticker.clone(),
                    failing_gate: FailingStage::Data,
                    reason: "no price data available".to_string(),
                    kind: Some(FailKind::NoData),
                    details: BTreeMap::new(),
                }),
                check: None,
            };
        };
        let check = self.monitor.check_ticker(&ticker.ticker, series, &input.index);
        TickerEvaluation {
            verdict: self.run_gates(ticker, series, input),
            check: Some(check),
        }
    }

    fn run_gates(&self, ticker: &TickerInput, series: &PriceSeries, input: &ScreeningInput) -> Verdict {
        let mut details = BTreeMap::new();

        let strength = self.relative_strength.evaluate(series, &input.index);
        if let Some(failed) = gate_failure(&ticker.ticker, &strength, &mut details) {
            return failed;
        }

        let levels = match self.structural_safety.support_levels(series) {
            Ok(levels) => levels,
            Err(err) => {
                details.insert(GateId::StructuralSafety, GateDetails::new());
                let reason = FailReason::from(err);
                return failure(&ticker.ticker, GateId::StructuralSafety, &reason, &mut details);
            }
        };
        let safety = self.structural_safety.judge(&levels, ticker.candidate_strike);
        if let Some(failed) = gate_failure(&ticker.ticker, &safety, &mut details) {
            return failed;
        }
        let max_safe_strike = self.structural_safety.max_safe_strike(&levels);
        let discount_pct = if levels.current_price > 0.0 {
            (levels.current_price - max_safe_strike) / levels.current_price * 100.0
        } else {
            0.0
        };

        let event = self
            .event_volatility
            .evaluate(series, input.as_of, ticker.options.as_ref());
        if let Some(failed) = gate_failure(&ticker.ticker, &event, &mut details) {
            return failed;
        }

        Verdict::Qualified(QualifiedTicker {
            ticker: ticker.ticker.clone(),
            max_safe_strike,
            discount_pct,
            details,
        })
    }
}

fn phase(phase: ScreeningPhase) {
    debug!(%phase, "screening phase");
}

/// File the gate's details; `Some` with the failure when the gate failed.
fn gate_failure(
    ticker: &str,
    result: &GateResult,
    details: &mut BTreeMap<GateId, GateDetails>,
) -> Option<Verdict> {
    details.insert(result.gate, result.details.clone());
    let reason = result.reason()?;
    Some(failure(ticker, result.gate, reason, details))
}

fn failure(
    ticker: &str,
    gate: GateId,
    reason: &FailReason,
    details: &mut BTreeMap<GateId, GateDetails>,
) -> Verdict {
    debug!(ticker, %gate, reason = %reason, "ticker failed");
    Verdict::Failed(FailedTicker {
        ticker: ticker.to_string(),
        failing_gate: FailingStage::Gate(gate),
        reason: reason.message.clone(),
        kind: Some(reason.kind),
        details: std::mem::take(details),
    })
}
