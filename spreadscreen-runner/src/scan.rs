//! End-to-end scan: resolve data, screen, persist.
//!
//! A scan loads the index, the volatility index and every watchlist ticker,
//! attaches options snapshots from the configured provider, runs the
//! screener and appends the result to the history file. Each scan gets a
//! content-addressed id: BLAKE3 over the configuration, the as-of date, the
//! per-ticker inputs (options snapshot and candidate strike) and every
//! loaded bar.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, info_span, warn};

use spreadscreen_core::{
    ConfigError, PriceSeries, Screener, ScreenerConfig, ScreeningInput, ScreeningResult,
    SeriesError, TickerInput,
};

use crate::data_loader::{load_all, DataSource, LoadError, LoadOptions};
use crate::history::{ScanHistory, ScanRecord};
use crate::options::OptionsDataProvider;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no data for market series {symbol}")]
    MissingMarketData { symbol: String },

    #[error("{symbol} has no bars on or before {as_of}")]
    NoBarsBefore { symbol: String, as_of: NaiveDate },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Everything a scan needs besides the screener configuration.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub tickers: Vec<String>,
    /// Screening date. Defaults to the last index bar; later bars are ignored.
    pub as_of: Option<NaiveDate>,
    pub index_symbol: String,
    pub volatility_symbol: String,
    pub data_dir: PathBuf,
    /// Fall back to synthetic series for missing CSVs.
    pub synthetic: bool,
    /// Intended short strikes, checked by the structural safety gate.
    pub candidate_strikes: BTreeMap<String, f64>,
    /// Append the result here when set.
    pub history_path: Option<PathBuf>,
}

impl ScanRequest {
    pub fn new(data_dir: impl Into<PathBuf>, tickers: Vec<String>) -> Self {
        Self {
            tickers,
            as_of: None,
            index_symbol: "SPY".to_string(),
            volatility_symbol: "VIX".to_string(),
            data_dir: data_dir.into(),
            synthetic: false,
            candidate_strikes: BTreeMap::new(),
            history_path: None,
        }
    }
}

/// A finished scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub result: ScreeningResult,
    pub sources: BTreeMap<String, DataSource>,
    /// True when any series was generated rather than loaded.
    pub synthetic: bool,
    /// False when a history path was set but the append failed.
    pub persisted: bool,
}

pub fn run_scan(
    request: &ScanRequest,
    config: &ScreenerConfig,
    options: &dyn OptionsDataProvider,
) -> Result<ScanOutcome, ScanError> {
    let screener = Screener::new(config.clone())?;
    let _span = info_span!("scan", tickers = request.tickers.len()).entered();

    let mut symbols = vec![request.index_symbol.as_str(), request.volatility_symbol.as_str()];
    symbols.extend(request.tickers.iter().map(String::as_str));
    let load_opts = LoadOptions {
        data_dir: request.data_dir.clone(),
        synthetic: request.synthetic,
        synthetic_end: request
            .as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
    };
    let mut data = load_all(&symbols, &load_opts)?;

    let index = market_series(&data.series, &request.index_symbol)?;
    let as_of = match request.as_of {
        Some(date) => date,
        None => index.last_date().ok_or_else(|| ScanError::MissingMarketData {
            symbol: request.index_symbol.clone(),
        })?,
    };
    let index = truncate_to(&index, as_of)?.ok_or_else(|| ScanError::NoBarsBefore {
        symbol: request.index_symbol.clone(),
        as_of,
    })?;
    let volatility = market_series(&data.series, &request.volatility_symbol)?;
    let volatility = truncate_to(&volatility, as_of)?.ok_or_else(|| ScanError::NoBarsBefore {
        symbol: request.volatility_symbol.clone(),
        as_of,
    })?;

    if !options.is_available() {
        info!(provider = options.name(), "options data unavailable; gate 4 uses volume only");
    }

    let mut tickers = Vec::with_capacity(request.tickers.len());
    for ticker in &request.tickers {
        let series = match data.take(ticker) {
            Some(s) => truncate_to(&s, as_of)?,
            None => None,
        };
        let mut input = TickerInput::new(ticker.clone(), series);
        if let Some(snapshot) = options.snapshot(ticker) {
            input = input.with_options(snapshot);
        }
        if let Some(&strike) = request.candidate_strikes.get(ticker) {
            input = input.with_candidate_strike(strike);
        }
        tickers.push(input);
    }

    let scan_id = scan_id(config, as_of, &tickers, &data.dataset_hash)?;
    let result = screener.screen(&ScreeningInput {
        as_of,
        index,
        volatility,
        tickers,
    });
    info!(
        scan_id = %scan_id,
        state = %result.system_state,
        qualified = result.qualified_tickers.len(),
        failed = result.failed_tickers.len(),
        alerts = result.alerts.len(),
        synthetic = data.has_synthetic,
        "scan complete"
    );

    let mut persisted = true;
    if let Some(path) = &request.history_path {
        let record = ScanRecord {
            scan_id: scan_id.clone(),
            recorded_at: Utc::now(),
            synthetic: data.has_synthetic,
            result: result.clone(),
        };
        if let Err(e) = ScanHistory::new(path.clone()).append(&record) {
            warn!(path = %path.display(), error = %e, "failed to persist scan; result still returned");
            persisted = false;
        }
    }

    Ok(ScanOutcome {
        scan_id,
        result,
        sources: data.sources,
        synthetic: data.has_synthetic,
        persisted,
    })
}

/// Market series are cloned so a watchlist may also name the index.
fn market_series(
    series: &BTreeMap<String, PriceSeries>,
    symbol: &str,
) -> Result<PriceSeries, ScanError> {
    series.get(symbol).cloned().ok_or_else(|| ScanError::MissingMarketData {
        symbol: symbol.to_string(),
    })
}

/// Bars on or before `as_of`; `None` when nothing remains.
fn truncate_to(series: &PriceSeries, as_of: NaiveDate) -> Result<Option<PriceSeries>, SeriesError> {
    let bars: Vec<_> = series
        .bars()
        .iter()
        .filter(|b| b.date <= as_of)
        .cloned()
        .collect();
    if bars.is_empty() {
        return Ok(None);
    }
    PriceSeries::new(series.symbol(), bars).map(Some)
}

fn scan_id(
    config: &ScreenerConfig,
    as_of: NaiveDate,
    tickers: &[TickerInput],
    dataset_hash: &str,
) -> Result<String, ConfigError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config.to_toml()?.as_bytes());
    hasher.update(as_of.to_string().as_bytes());
    for input in tickers {
        hasher.update(input.ticker.as_bytes());
        hasher.update(b"\0");
        let options = input.options.as_ref();
        hash_number(&mut hasher, options.and_then(|o| o.iv_rank));
        hash_number(&mut hasher, options.and_then(|o| o.iv_change_5d_pct));
        match options.and_then(|o| o.earnings_date) {
            Some(date) => hasher.update(date.to_string().as_bytes()),
            None => hasher.update(b"-"),
        };
        hash_number(&mut hasher, input.candidate_strike);
    }
    hasher.update(dataset_hash.as_bytes());
    let hex = hasher.finalize().to_hex();
    Ok(hex[..16].to_string())
}

/// Absent values hash to a tag byte so `None` never collides with a number.
fn hash_number(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update(&[1]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}
