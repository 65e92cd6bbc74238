//! Screener configuration.
//!
//! Every gate, the failure monitor, and the strike selector carry their own
//! serde config struct whose `Default` holds the documented constants.
//! `ScreenerConfig` bundles them and is what a TOML file deserializes into.
//! Validation happens once, at load or construction time; a config that
//! passes validation can never produce a configuration error mid-cycle.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::gates::{
    EventVolatilityConfig, MarketRegimeConfig, RelativeStrengthConfig, StructuralSafetyConfig,
};
use crate::monitor::MonitorConfig;
use crate::strikes::StrikeSelectorConfig;

/// Errors from loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("read config file: {0}")]
    Io(String),

    #[error("parse config TOML: {0}")]
    Parse(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub(crate) fn positive_period(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be at least 1"));
    }
    Ok(())
}

pub(crate) fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(field, format!("must be > 0 (got {value})")));
    }
    Ok(())
}

pub(crate) fn finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(field, "must be finite"));
    }
    Ok(())
}

pub(crate) fn ordered<T: PartialOrd + std::fmt::Display>(
    field: &str,
    low: T,
    high: T,
) -> Result<(), ConfigError> {
    if low > high {
        return Err(ConfigError::invalid(
            field,
            format!("lower bound {low} exceeds upper bound {high}"),
        ));
    }
    Ok(())
}

/// Complete configuration for one screening cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    /// Fan per-ticker gate evaluation out over the rayon pool.
    pub parallel_tickers: bool,
    pub market_regime: MarketRegimeConfig,
    pub relative_strength: RelativeStrengthConfig,
    pub structural_safety: StructuralSafetyConfig,
    pub event_volatility: EventVolatilityConfig,
    pub monitor: MonitorConfig,
    pub strikes: StrikeSelectorConfig,
}

impl ScreenerConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string. Missing keys take defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.market_regime.validate()?;
        self.relative_strength.validate()?;
        self.structural_safety.validate()?;
        self.event_volatility.validate()?;
        self.monitor.validate()?;
        self.strikes.validate()?;
        Ok(())
    }
}
