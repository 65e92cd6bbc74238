//! The four screening gates.
//!
//! Each gate is an ordered list of sub-conditions. Conditions run in order and
//! evaluation stops at the first failure, whose reason becomes the gate's
//! reason. Indicator values computed along the way are recorded in the
//! result's details, so a failed result still shows what was looked at.
//!
//! Gates never return errors for data problems: short or broken series turn
//! into a failed result with `FailKind::InsufficientData` / `InvalidData`.

pub mod event_volatility;
pub mod market_regime;
pub mod relative_strength;
pub mod structural_safety;

pub use event_volatility::{EventVolatilityConfig, EventVolatilityGate};
pub use market_regime::{MarketRegimeConfig, MarketRegimeGate};
pub use relative_strength::{RelativeStrengthConfig, RelativeStrengthGate};
pub use structural_safety::{StructuralSafetyConfig, StructuralSafetyGate, SupportLevels};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::indicators::IndicatorError;

/// Which gate produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateId {
    MarketRegime,
    RelativeStrength,
    StructuralSafety,
    EventVolatility,
}

impl GateId {
    /// Position in the pipeline (1-based).
    pub fn number(self) -> u8 {
        match self {
            Self::MarketRegime => 1,
            Self::RelativeStrength => 2,
            Self::StructuralSafety => 3,
            Self::EventVolatility => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MarketRegime => "MARKET_REGIME",
            Self::RelativeStrength => "RELATIVE_STRENGTH",
            Self::StructuralSafety => "STRUCTURAL_SAFETY",
            Self::EventVolatility => "EVENT_VOLATILITY",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate {} ({})", self.number(), self.label())
    }
}

/// Category of a gate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailKind {
    /// Series shorter than the lookback a condition needs.
    InsufficientData,
    /// Inputs produced a non-finite value or an unusable period.
    InvalidData,
    /// No price series was supplied at all.
    NoData,
    CloseBelowSma,
    SmaDeclining,
    LowerLow,
    VolatilitySpike,
    Underperforming,
    StrikeAboveSupport,
    NoViableStrike,
    EarningsInWindow,
    IvRankOutOfRange,
    IvExpanding,
    HeavyDownDayVolume,
}

/// Why a gate failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailReason {
    pub kind: FailKind,
    pub message: String,
}

impl FailReason {
    pub fn new(kind: FailKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<IndicatorError> for FailReason {
    fn from(err: IndicatorError) -> Self {
        let kind = match err {
            IndicatorError::InsufficientData { .. } => FailKind::InsufficientData,
            IndicatorError::InvalidPeriod { .. } | IndicatorError::NonFinite { .. } => {
                FailKind::InvalidData
            }
        };
        Self::new(kind, err.to_string())
    }
}

/// A single recorded value in a gate's details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Number(f64),
    Flag(bool),
    Date(NaiveDate),
    Text(String),
    /// Sub-check not evaluated; holds why (e.g. no options data).
    Skipped { skipped: String },
}

impl DetailValue {
    pub fn skipped(why: impl Into<String>) -> Self {
        Self::Skipped {
            skipped: why.into(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Indicator name → computed value, ordered by name.
pub type GateDetails = BTreeMap<String, DetailValue>;

/// Verdict of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GateOutcome {
    Passed,
    Failed { reason: FailReason },
}

/// Result of evaluating one gate. Built fresh per call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: GateId,
    pub outcome: GateOutcome,
    pub details: GateDetails,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, GateOutcome::Passed)
    }

    /// Failure reason; `Some` exactly when the gate failed.
    pub fn reason(&self) -> Option<&FailReason> {
        match &self.outcome {
            GateOutcome::Passed => None,
            GateOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn fail_kind(&self) -> Option<FailKind> {
        self.reason().map(|r| r.kind)
    }

    pub fn detail(&self, name: &str) -> Option<&DetailValue> {
        self.details.get(name)
    }

    pub fn detail_number(&self, name: &str) -> Option<f64> {
        self.details.get(name).and_then(DetailValue::as_number)
    }

    pub(crate) fn failed(gate: GateId, reason: FailReason, details: GateDetails) -> Self {
        Self {
            gate,
            outcome: GateOutcome::Failed { reason },
            details,
        }
    }
}

/// One ordered sub-condition: records what it computed into the details and
/// returns `Err` with the failure reason when it does not hold.
pub(crate) type Condition<C> = fn(&C, &mut GateDetails) -> Result<(), FailReason>;

/// Run `conditions` in order, stopping at the first failure.
pub(crate) fn run_conditions<C>(gate: GateId, inputs: &C, conditions: &[Condition<C>]) -> GateResult {
    let mut details = GateDetails::new();
    for condition in conditions {
        if let Err(reason) = condition(inputs, &mut details) {
            debug!(%gate, kind = ?reason.kind, reason = %reason.message, "gate failed");
            return GateResult::failed(gate, reason, details);
        }
    }
    debug!(%gate, "gate passed");
    GateResult {
        gate,
        outcome: GateOutcome::Passed,
        details,
    }
}

pub(crate) fn record(details: &mut GateDetails, name: &str, value: DetailValue) {
    details.insert(name.to_string(), value);
}

pub(crate) fn record_number(details: &mut GateDetails, name: &str, value: f64) {
    record(details, name, DetailValue::Number(value));
}

pub(crate) fn record_flag(details: &mut GateDetails, name: &str, value: bool) {
    record(details, name, DetailValue::Flag(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inputs {
        first: bool,
        second: bool,
    }

    fn first(inputs: &Inputs, details: &mut GateDetails) -> Result<(), FailReason> {
        record_flag(details, "first", inputs.first);
        if inputs.first {
            Ok(())
        } else {
            Err(FailReason::new(FailKind::CloseBelowSma, "first failed"))
        }
    }

    fn second(inputs: &Inputs, details: &mut GateDetails) -> Result<(), FailReason> {
        record_flag(details, "second", inputs.second);
        if inputs.second {
            Ok(())
        } else {
            Err(FailReason::new(FailKind::LowerLow, "second failed"))
        }
    }

    #[test]
    fn stops_at_first_failure() {
        let inputs = Inputs {
            first: false,
            second: false,
        };
        let result = run_conditions(GateId::MarketRegime, &inputs, &[first, second]);
        assert!(!result.passed());
        assert_eq!(result.fail_kind(), Some(FailKind::CloseBelowSma));
        assert!(result.detail("second").is_none());
    }

    #[test]
    fn passes_when_all_hold() {
        let inputs = Inputs {
            first: true,
            second: true,
        };
        let result = run_conditions(GateId::MarketRegime, &inputs, &[first, second]);
        assert!(result.passed());
        assert!(result.reason().is_none());
        assert_eq!(result.details.len(), 2);
    }

    #[test]
    fn indicator_error_maps_to_fail_kind() {
        let reason: FailReason = IndicatorError::InsufficientData {
            indicator: "sma".into(),
            required: 50,
            available: 10,
        }
        .into();
        assert_eq!(reason.kind, FailKind::InsufficientData);
        assert!(reason.message.contains("need 50"));
    }

    #[test]
    fn gate_display_includes_number() {
        assert_eq!(
            GateId::StructuralSafety.to_string(),
            "gate 3 (STRUCTURAL_SAFETY)"
        );
    }
}
