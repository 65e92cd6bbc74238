//! Integration tests for the scan pipeline: CSV files on disk through the
//! screener into the JSONL history.

use chrono::{Duration, NaiveDate};
use std::path::Path;

use spreadscreen_core::{
    Bar, FailKind, FailingStage, GateId, PriceSeries, ScreenerConfig, SystemState,
};
use spreadscreen_runner::{
    csv_path, run_scan, write_series_csv, DataSource, FileOptionsProvider,
    NoOptionsProvider, ScanError, ScanHistory, ScanRequest, TickerStatus,
};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn last_date(n: usize) -> NaiveDate {
    base_date() + Duration::days(n as i64 - 1)
}

fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date() + Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1_000,
            }
        })
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}

fn rising(symbol: &str, n: usize, step: f64) -> PriceSeries {
    series(symbol, &(0..n).map(|i| 100.0 + i as f64 * step).collect::<Vec<_>>())
}

/// SPY drifting up, VIX flat at 20, LEAD outrunning the index.
fn write_market(dir: &Path) {
    for s in [
        rising("SPY", 60, 0.1),
        series("VIX", &[20.0; 30]),
        rising("LEAD", 60, 1.0),
    ] {
        write_series_csv(&csv_path(dir, s.symbol()), &s).unwrap();
    }
}

fn request(dir: &Path) -> ScanRequest {
    let mut req = ScanRequest::new(dir, vec!["LEAD".to_string(), "GONE".to_string()]);
    req.history_path = Some(dir.join("history/scans.jsonl"));
    req
}

#[test]
fn scan_from_csv_qualifies_leader_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());

    let outcome = run_scan(&request(dir.path()), &ScreenerConfig::default(), &NoOptionsProvider)
        .unwrap();

    assert_eq!(outcome.result.as_of, last_date(60));
    assert_eq!(outcome.result.system_state, SystemState::RiskOn);
    assert!(outcome.result.is_qualified("LEAD"));
    assert_eq!(outcome.result.failed("GONE").unwrap().kind, Some(FailKind::NoData));
    assert_eq!(outcome.sources["LEAD"], DataSource::Csv);
    assert_eq!(outcome.sources["GONE"], DataSource::Missing);
    assert!(!outcome.synthetic);
    assert!(outcome.persisted);

    let history = ScanHistory::new(dir.path().join("history/scans.jsonl"));
    let latest = history.latest().unwrap().unwrap();
    assert_eq!(latest.scan_id, outcome.scan_id);
    assert!(!latest.synthetic);

    let entries = history.for_ticker("lead").unwrap();
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0].status, TickerStatus::Qualified { .. }));
    let gone = history.for_ticker("GONE").unwrap();
    assert!(matches!(
        gone[0].status,
        TickerStatus::Failed {
            stage: FailingStage::Data,
            ..
        }
    ));
}

#[test]
fn repeated_scans_share_an_id_and_append() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    let req = request(dir.path());

    let a = run_scan(&req, &ScreenerConfig::default(), &NoOptionsProvider).unwrap();
    let b = run_scan(&req, &ScreenerConfig::default(), &NoOptionsProvider).unwrap();
    assert_eq!(a.scan_id, b.scan_id);

    let history = ScanHistory::new(dir.path().join("history/scans.jsonl"));
    assert_eq!(history.load_all().unwrap().len(), 2);
    assert_eq!(history.for_date(last_date(60)).unwrap().len(), 2);
    assert!(history.for_date(base_date()).unwrap().is_empty());
}

#[test]
fn explicit_as_of_ignores_later_bars() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    let mut req = request(dir.path());
    req.as_of = Some(last_date(55));

    let outcome = run_scan(&req, &ScreenerConfig::default(), &NoOptionsProvider).unwrap();
    assert_eq!(outcome.result.as_of, last_date(55));
}

#[test]
fn missing_index_is_an_error_without_synthetic() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_scan(&request(dir.path()), &ScreenerConfig::default(), &NoOptionsProvider)
        .unwrap_err();
    assert!(matches!(err, ScanError::MissingMarketData { ref symbol } if symbol == "SPY"));
}

#[test]
fn synthetic_fallback_tags_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path());
    req.synthetic = true;
    req.as_of = Some(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap());

    let outcome = run_scan(&req, &ScreenerConfig::default(), &NoOptionsProvider).unwrap();
    assert!(outcome.synthetic);
    assert_eq!(outcome.sources["SPY"], DataSource::Synthetic);

    let history = ScanHistory::new(dir.path().join("history/scans.jsonl"));
    assert!(history.latest().unwrap().unwrap().synthetic);
}

#[test]
fn history_failure_still_returns_result() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    let mut req = request(dir.path());
    // A directory cannot be opened for append.
    req.history_path = Some(dir.path().to_path_buf());

    let outcome = run_scan(&req, &ScreenerConfig::default(), &NoOptionsProvider).unwrap();
    assert!(!outcome.persisted);
    assert!(outcome.result.is_qualified("LEAD"));
}

#[test]
fn options_file_feeds_event_gate() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    let earnings = last_date(60) + Duration::days(35);
    let provider =
        FileOptionsProvider::from_toml(&format!("[LEAD]\nearnings_date = \"{earnings}\"\n"))
            .unwrap();

    let outcome = run_scan(&request(dir.path()), &ScreenerConfig::default(), &provider).unwrap();
    let lead = outcome.result.failed("LEAD").unwrap();
    assert_eq!(lead.failing_gate, FailingStage::Gate(GateId::EventVolatility));
    assert_eq!(lead.kind, Some(FailKind::EarningsInWindow));
}

#[test]
fn candidate_strike_above_support_fails_gate_three() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    let mut req = request(dir.path());
    req.candidate_strikes.insert("LEAD".to_string(), 158.0);

    let outcome = run_scan(&req, &ScreenerConfig::default(), &NoOptionsProvider).unwrap();
    let lead = outcome.result.failed("LEAD").unwrap();
    assert_eq!(lead.kind, Some(FailKind::StrikeAboveSupport));
}

#[test]
fn malformed_history_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    run_scan(&request(dir.path()), &ScreenerConfig::default(), &NoOptionsProvider).unwrap();

    let path = dir.path().join("history/scans.jsonl");
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{not json}\n\n");
    std::fs::write(&path, content).unwrap();

    let history = ScanHistory::new(path);
    assert_eq!(history.load_all().unwrap().len(), 1);
}

#[test]
fn missing_history_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let history = ScanHistory::new(dir.path().join("none.jsonl"));
    assert!(history.load_all().unwrap().is_empty());
    assert!(history.latest().unwrap().is_none());
}
