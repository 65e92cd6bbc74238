//! Alert types emitted by the failure-mode detectors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gates::GateDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureMode {
    RegimeTransition,
    RelativeStrengthBreakdown,
    CorrelatedBreakdown,
    VolatilityExpansion,
}

impl FailureMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::RegimeTransition => "REGIME_TRANSITION",
            Self::RelativeStrengthBreakdown => "RELATIVE_STRENGTH_BREAKDOWN",
            Self::CorrelatedBreakdown => "CORRELATED_BREAKDOWN",
            Self::VolatilityExpansion => "VOLATILITY_EXPANSION",
        }
    }

    /// Severity every alert of this mode carries.
    pub fn severity(self) -> Severity {
        match self {
            Self::RegimeTransition => Severity::Critical,
            Self::CorrelatedBreakdown => Severity::High,
            Self::RelativeStrengthBreakdown | Self::VolatilityExpansion => Severity::Warning,
        }
    }

    pub fn action(self) -> AlertAction {
        match self {
            Self::RegimeTransition => AlertAction::DisableNewEntries,
            Self::RelativeStrengthBreakdown => AlertAction::RemoveTicker,
            Self::CorrelatedBreakdown => AlertAction::ReduceGlobalRisk,
            Self::VolatilityExpansion => AlertAction::Warn,
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "WARNING",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertAction {
    DisableNewEntries,
    RemoveTicker,
    ReduceGlobalRisk,
    /// Informational; no state change.
    Warn,
}

/// One triggered detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAlert {
    pub mode: FailureMode,
    pub severity: Severity,
    pub action: AlertAction,
    pub message: String,
    /// Set for per-ticker detectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default)]
    pub details: GateDetails,
}

impl FailureAlert {
    pub(crate) fn new(mode: FailureMode, message: String, details: GateDetails) -> Self {
        Self {
            mode,
            severity: mode.severity(),
            action: mode.action(),
            message,
            ticker: None,
            details,
        }
    }

    pub(crate) fn for_ticker(mut self, ticker: &str) -> Self {
        self.ticker = Some(ticker.to_string());
        self
    }

    /// The ticker this alert removes from the qualified list, if any.
    pub fn removes(&self) -> Option<&str> {
        match self.action {
            AlertAction::RemoveTicker => self.ticker.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for FailureAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.mode, self.message)
    }
}

/// A detector that could not run this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDetector {
    pub mode: FailureMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub reason: String,
}
