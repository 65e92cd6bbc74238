//! Price loading for the runner.
//!
//! Series live as one CSV file per symbol, `{data_dir}/{SYMBOL}.csv`, with a
//! `date,open,high,low,close,volume` header. Resolution policy:
//! 1. If the file exists → parse it (malformed files are an error)
//! 2. If not and synthetic data is enabled → generate a tagged random walk
//! 3. Otherwise → `None`; the screener reports the ticker as lacking data

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use spreadscreen_core::{Bar, PriceSeries, SeriesError};

use crate::synthetic::synthetic_series;

/// Bars generated per symbol when falling back to synthetic data.
pub const SYNTHETIC_BARS: usize = 252;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("parse {path}: {message}")]
    Toml { path: PathBuf, message: String },

    #[error("{path} holds no rows")]
    Empty { path: PathBuf },

    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),
}

/// Where a symbol's bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    Synthetic,
    Missing,
}

/// Options controlling how series are resolved.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub data_dir: PathBuf,
    /// Generate synthetic bars when a CSV is missing.
    pub synthetic: bool,
    /// Last bar date for synthetic series.
    pub synthetic_end: NaiveDate,
}

/// Series resolved for a batch of symbols, with provenance.
#[derive(Debug, Default)]
pub struct LoadedData {
    pub series: BTreeMap<String, PriceSeries>,
    pub sources: BTreeMap<String, DataSource>,
    /// BLAKE3 over every loaded bar.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl LoadedData {
    pub fn take(&mut self, symbol: &str) -> Option<PriceSeries> {
        self.series.remove(symbol)
    }
}

/// Path of a symbol's CSV under `data_dir`.
pub fn csv_path(data_dir: &Path, symbol: &str) -> PathBuf {
    data_dir.join(format!("{}.csv", symbol.to_uppercase()))
}

/// Read a series CSV. Rows may come in any order; they are sorted by date
/// and then validated.
pub fn read_series_csv(path: &Path, symbol: &str) -> Result<PriceSeries, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let mut bars = Vec::new();
    for row in reader.deserialize::<Bar>() {
        bars.push(row.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?);
    }
    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    bars.sort_by_key(|b| b.date);
    Ok(PriceSeries::new(symbol, bars)?)
}

/// Write a series as CSV, creating parent directories.
pub fn write_series_csv(path: &Path, series: &PriceSeries) -> Result<(), LoadError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LoadError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for bar in series.bars() {
        writer.serialize(bar).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve one symbol. `Ok(None)` when nothing is available.
pub fn load_series(
    symbol: &str,
    opts: &LoadOptions,
) -> Result<Option<(PriceSeries, DataSource)>, LoadError> {
    let path = csv_path(&opts.data_dir, symbol);
    if path.exists() {
        debug!(symbol, path = %path.display(), "loading csv");
        return Ok(Some((read_series_csv(&path, symbol)?, DataSource::Csv)));
    }
    if opts.synthetic {
        warn!(symbol, "no csv; generating synthetic data (results will be tagged synthetic)");
        let series = synthetic_series(symbol, opts.synthetic_end, SYNTHETIC_BARS)?;
        return Ok(Some((series, DataSource::Synthetic)));
    }
    Ok(None)
}

/// Resolve a batch of symbols. Missing symbols are recorded, not fatal.
pub fn load_all(symbols: &[&str], opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let mut data = LoadedData::default();
    for &symbol in symbols {
        match load_series(symbol, opts)? {
            Some((series, source)) => {
                data.has_synthetic |= source == DataSource::Synthetic;
                data.sources.insert(symbol.to_string(), source);
                data.series.insert(symbol.to_string(), series);
            }
            None => {
                data.sources.insert(symbol.to_string(), DataSource::Missing);
            }
        }
    }
    data.dataset_hash = dataset_hash(data.series.values());
    Ok(data)
}

/// Deterministic BLAKE3 hash over symbols and every OHLCV value, in the
/// iteration order given (callers pass a sorted map).
pub fn dataset_hash<'a>(series: impl IntoIterator<Item = &'a PriceSeries>) -> String {
    let mut hasher = blake3::Hasher::new();
    for s in series {
        hasher.update(s.symbol().as_bytes());
        for bar in s.bars() {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
