//! System state derivation.
//!
//! The state is never stored. Each cycle recomputes it from the Gate 1
//! result and the monitor's alerts and hands it to aggregation explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gates::GateResult;
use crate::monitor::{FailureAlert, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    RiskOn,
    RiskOff,
    ReducedRisk,
}

impl SystemState {
    /// New entries are allowed only when risk is on.
    pub fn allows_new_trades(self) -> bool {
        self == Self::RiskOn
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RiskOn => "RISK_ON",
            Self::RiskOff => "RISK_OFF",
            Self::ReducedRisk => "REDUCED_RISK",
        })
    }
}

/// Precedence: a CRITICAL alert forces `RiskOff`, then a failed Gate 1,
/// then any HIGH alert gives `ReducedRisk`; otherwise `RiskOn`.
pub fn derive_system_state(market_regime: &GateResult, alerts: &[FailureAlert]) -> SystemState {
    let worst = alerts.iter().map(|a| a.severity).max();
    if worst == Some(Severity::Critical) || !market_regime.passed() {
        SystemState::RiskOff
    } else if worst == Some(Severity::High) {
        SystemState::ReducedRisk
    } else {
        SystemState::RiskOn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::{FailKind, FailReason, GateDetails, GateId, GateOutcome};
    use crate::monitor::FailureMode;

    fn gate(passed: bool) -> GateResult {
        let outcome = if passed {
            GateOutcome::Passed
        } else {
            GateOutcome::Failed {
                reason: FailReason::new(FailKind::CloseBelowSma, "below"),
            }
        };
        GateResult {
            gate: GateId::MarketRegime,
            outcome,
            details: GateDetails::new(),
        }
    }

    fn alert(mode: FailureMode) -> FailureAlert {
        FailureAlert::new(mode, mode.label().to_string(), GateDetails::new())
    }

    #[test]
    fn clean_cycle_is_risk_on() {
        assert_eq!(derive_system_state(&gate(true), &[]), SystemState::RiskOn);
    }

    #[test]
    fn critical_overrides_passing_gate() {
        let alerts = [alert(FailureMode::RegimeTransition)];
        assert_eq!(derive_system_state(&gate(true), &alerts), SystemState::RiskOff);
    }

    #[test]
    fn failed_gate_one_is_risk_off_even_with_high_alert() {
        let alerts = [alert(FailureMode::CorrelatedBreakdown)];
        assert_eq!(derive_system_state(&gate(false), &alerts), SystemState::RiskOff);
    }

    #[test]
    fn high_alert_reduces_risk() {
        let alerts = [
            alert(FailureMode::VolatilityExpansion),
            alert(FailureMode::CorrelatedBreakdown),
        ];
        let state = derive_system_state(&gate(true), &alerts);
        assert_eq!(state, SystemState::ReducedRisk);
        assert!(!state.allows_new_trades());
    }

    #[test]
    fn warnings_leave_state_alone() {
        let alerts = [
            alert(FailureMode::VolatilityExpansion),
            alert(FailureMode::RelativeStrengthBreakdown),
        ];
        assert_eq!(derive_system_state(&gate(true), &alerts), SystemState::RiskOn);
    }

    #[test]
    fn serializes_as_screaming_case() {
        assert_eq!(
            serde_json::to_string(&SystemState::ReducedRisk).unwrap(),
            "\"REDUCED_RISK\""
        );
        assert_eq!(SystemState::RiskOff.to_string(), "RISK_OFF");
    }
}
