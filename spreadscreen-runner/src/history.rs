//! JSONL scan history.
//!
//! Each completed scan appends one [`ScanRecord`] line. The file is the
//! system of record for "what did the screener say on date D about ticker
//! T". Malformed lines are skipped on read so one bad write cannot poison
//! the whole history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use spreadscreen_core::{FailingStage, ScreeningResult, SystemState};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One persisted scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub recorded_at: DateTime<Utc>,
    /// True when any series in the scan was generated rather than loaded.
    pub synthetic: bool,
    pub result: ScreeningResult,
}

impl ScanRecord {
    pub fn as_of(&self) -> NaiveDate {
        self.result.as_of
    }
}

/// How a ticker fared in one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickerStatus {
    Qualified { max_safe_strike: f64 },
    Failed { stage: FailingStage, reason: String },
}

/// A ticker's row in one historical scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerHistoryEntry {
    pub as_of: NaiveDate,
    pub scan_id: String,
    pub system_state: SystemState,
    pub status: TickerStatus,
}

/// Append-only JSONL store.
#[derive(Debug, Clone)]
pub struct ScanHistory {
    path: PathBuf,
}

impl ScanHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ScanRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let line = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// All records in file order. A missing file is an empty history.
    pub fn load_all(&self) -> Result<Vec<ScanRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let mut records = Vec::new();
        for (i, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ScanRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = i + 1, error = %e, "skipping malformed history line"),
            }
        }
        Ok(records)
    }

    /// Most recently appended record.
    pub fn latest(&self) -> Result<Option<ScanRecord>, HistoryError> {
        Ok(self.load_all()?.pop())
    }

    /// Records whose screening date is `as_of`.
    pub fn for_date(&self, as_of: NaiveDate) -> Result<Vec<ScanRecord>, HistoryError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.as_of() == as_of)
            .collect())
    }

    /// Every scan that mentioned `ticker`, oldest first.
    pub fn for_ticker(&self, ticker: &str) -> Result<Vec<TickerHistoryEntry>, HistoryError> {
        let ticker = ticker.to_uppercase();
        let mut entries = Vec::new();
        for record in self.load_all()? {
            let result = &record.result;
            let status = if let Some(q) = result.qualified(&ticker) {
                TickerStatus::Qualified {
                    max_safe_strike: q.max_safe_strike,
                }
            } else if let Some(f) = result.failed(&ticker) {
                TickerStatus::Failed {
                    stage: f.failing_gate,
                    reason: f.reason.clone(),
                }
            } else {
                continue;
            };
            entries.push(TickerHistoryEntry {
                as_of: result.as_of,
                scan_id: record.scan_id.clone(),
                system_state: result.system_state,
                status,
            });
        }
        Ok(entries)
    }
}
