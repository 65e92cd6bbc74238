//! SpreadScreen Core — gate evaluation engine and failure-mode state machine.
//!
//! This crate contains the screening logic for put-credit-spread candidates:
//! - Domain types (bars, price series, options snapshots)
//! - Scalar indicator utilities (SMA, slope, returns, ATR, swing lows, volume)
//! - Four sequential gates with short-circuit evaluation
//! - Failure-mode monitor with four independent detectors
//! - System-state derivation and the screener orchestrator
//! - Strike selection for qualified tickers
//!
//! The core performs no I/O. All series arrive pre-fetched and immutable.

pub mod config;
pub mod domain;
pub mod gates;
pub mod indicators;
pub mod monitor;
pub mod screener;
pub mod state;
pub mod strikes;

pub use config::{ConfigError, ScreenerConfig};
pub use domain::{Bar, OptionsSnapshot, PriceSeries, SeriesError};
pub use gates::{DetailValue, FailKind, FailReason, GateDetails, GateId, GateOutcome, GateResult};
pub use monitor::{AlertAction, FailureAlert, FailureMode, FailureMonitor, MonitorReport, Severity};
pub use screener::{
    FailedTicker, FailingStage, QualifiedTicker, Screener, ScreeningInput, ScreeningResult,
    TickerInput,
};
pub use state::{derive_system_state, SystemState};
pub use strikes::{PutQuote, SpreadCandidate, StrikeError, StrikeRequest, StrikeSelector};
