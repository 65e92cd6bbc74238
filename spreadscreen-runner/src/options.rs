//! Options-data providers.
//!
//! The event and volatility gate needs IV rank, the five-session IV change
//! and the next earnings date. Providers supply whatever subset they know;
//! the gate records missing fields as skipped checks.
//!
//! The file provider reads a TOML table per ticker. Dates are quoted strings:
//!
//! ```toml
//! [AAPL]
//! iv_rank = 35.0
//! iv_change_5d_pct = 1.2
//! earnings_date = "2024-07-25"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use spreadscreen_core::OptionsSnapshot;

use crate::data_loader::LoadError;

/// A source of per-ticker options metadata.
pub trait OptionsDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Snapshot for `ticker`, or `None` when the provider knows nothing.
    fn snapshot(&self, ticker: &str) -> Option<OptionsSnapshot>;

    fn is_available(&self) -> bool;
}

/// Provider that never has data. Gate 4 then relies on volume alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOptionsProvider;

impl OptionsDataProvider for NoOptionsProvider {
    fn name(&self) -> &str {
        "none"
    }

    fn snapshot(&self, _ticker: &str) -> Option<OptionsSnapshot> {
        None
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Provider backed by a TOML file of snapshots keyed by ticker.
#[derive(Debug, Default, Clone)]
pub struct FileOptionsProvider {
    snapshots: BTreeMap<String, OptionsSnapshot>,
}

impl FileOptionsProvider {
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|e| LoadError::Toml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let raw: BTreeMap<String, OptionsSnapshot> = toml::from_str(content)?;
        let snapshots = raw
            .into_iter()
            .map(|(ticker, snap)| (ticker.to_uppercase(), snap))
            .collect();
        Ok(Self { snapshots })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl OptionsDataProvider for FileOptionsProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn snapshot(&self, ticker: &str) -> Option<OptionsSnapshot> {
        self.snapshots
            .get(&ticker.to_uppercase())
            .filter(|s| !s.is_empty())
            .cloned()
    }

    fn is_available(&self) -> bool {
        !self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"
[aapl]
iv_rank = 35.0
iv_change_5d_pct = 1.2
earnings_date = "2024-07-25"

[MSFT]
iv_rank = 70.0

[EMPTY]
"#;

    #[test]
    fn parses_partial_snapshots() {
        let provider = FileOptionsProvider::from_toml(SAMPLE).unwrap();
        assert_eq!(provider.len(), 3);

        let aapl = provider.snapshot("AAPL").unwrap();
        assert_eq!(aapl.iv_rank, Some(35.0));
        assert_eq!(aapl.earnings_date, NaiveDate::from_ymd_opt(2024, 7, 25));

        let msft = provider.snapshot("msft").unwrap();
        assert_eq!(msft.iv_rank, Some(70.0));
        assert!(msft.earnings_date.is_none());
    }

    #[test]
    fn empty_table_and_unknown_ticker_are_none() {
        let provider = FileOptionsProvider::from_toml(SAMPLE).unwrap();
        assert!(provider.snapshot("EMPTY").is_none());
        assert!(provider.snapshot("TSLA").is_none());
    }

    #[test]
    fn bad_toml_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.toml");
        std::fs::write(&path, "[AAPL]\niv_rank = \"high\"\n").unwrap();
        assert!(matches!(
            FileOptionsProvider::from_file(&path),
            Err(LoadError::Toml { .. })
        ));
    }

    #[test]
    fn null_provider_has_nothing() {
        let provider = NoOptionsProvider;
        assert!(!provider.is_available());
        assert!(provider.snapshot("AAPL").is_none());
    }
}
