//! SpreadScreen Runner — scan orchestration on top of `spreadscreen-core`.
//!
//! This crate provides:
//! - CSV price loading with an opt-in synthetic fallback
//! - Options-data providers (TOML file, none)
//! - Put-chain CSV loading for strike selection
//! - Watchlist parsing
//! - Content-addressed scans and JSONL scan history

pub mod chain;
pub mod data_loader;
pub mod history;
pub mod options;
pub mod scan;
pub mod synthetic;
pub mod watchlist;

pub use chain::load_put_chain;
pub use data_loader::{
    csv_path, dataset_hash, load_all, load_series, read_series_csv, write_series_csv, DataSource,
    LoadError, LoadOptions, LoadedData,
};
pub use history::{HistoryError, ScanHistory, ScanRecord, TickerHistoryEntry, TickerStatus};
pub use options::{FileOptionsProvider, NoOptionsProvider, OptionsDataProvider};
pub use scan::{run_scan, ScanError, ScanOutcome, ScanRequest};
pub use synthetic::synthetic_series;
pub use watchlist::{load_watchlist, parse_watchlist};
