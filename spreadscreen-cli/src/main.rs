//! SpreadScreen CLI — daily screening, strike selection, and history.
//!
//! Commands:
//! - `scan`: screen a watchlist and append the result to the scan history
//! - `strikes`: rank put credit spreads for a ticker that qualifies today
//! - `history`: show past scans, optionally for one ticker or date
//! - `config show`: print the default configuration as TOML
//! - `config validate`: load and validate a TOML config file

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use spreadscreen_core::strikes::{StrikeRequest, StrikeSelector};
use spreadscreen_core::{GateId, ScreenerConfig, ScreeningResult, SpreadCandidate};
use spreadscreen_runner::{
    load_put_chain, load_watchlist, run_scan, FileOptionsProvider, NoOptionsProvider,
    OptionsDataProvider, ScanHistory, ScanOutcome, ScanRequest, TickerStatus,
};

#[derive(Parser)]
#[command(
    name = "spreadscreen",
    about = "SpreadScreen CLI — put credit spread screener"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where scans read data from. Shared by `scan` and `strikes`.
#[derive(clap::Args)]
struct DataArgs {
    /// Path to a TOML screener config. Defaults to built-in thresholds.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding one `{SYMBOL}.csv` per symbol.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// TOML file of per-ticker options snapshots (IV rank, IV change, earnings).
    #[arg(long)]
    options: Option<PathBuf>,

    /// Screening date (YYYY-MM-DD). Defaults to the last index bar.
    #[arg(long)]
    as_of: Option<String>,

    /// Broad-market index symbol.
    #[arg(long, default_value = "SPY")]
    index: String,

    /// Volatility index symbol.
    #[arg(long, default_value = "VIX")]
    volatility: String,

    /// Generate synthetic series for missing CSVs (results are tagged).
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen tickers through the four gates and the failure monitor.
    Scan {
        /// Tickers to screen (e.g., AAPL MSFT NVDA).
        tickers: Vec<String>,

        /// Watchlist file; merged with any tickers given on the command line.
        #[arg(long)]
        watchlist: Option<PathBuf>,

        /// Intended short strike per ticker, as TICKER=STRIKE. Repeatable.
        #[arg(long = "strike", value_name = "TICKER=STRIKE")]
        strikes: Vec<String>,

        #[command(flatten)]
        data: DataArgs,

        /// Scan history file.
        #[arg(long, default_value = "data/history/scans.jsonl")]
        history: PathBuf,

        /// Do not append the result to the history file.
        #[arg(long, default_value_t = false)]
        no_history: bool,

        /// Print the full result as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Rank put credit spreads for a ticker that passes today's screen.
    Strikes {
        ticker: String,

        /// Put chain CSV: expiration,strike,bid,ask,delta,volume,open_interest.
        #[arg(long)]
        chain: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Print candidates as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show past scans.
    History {
        /// Only show this ticker's verdicts.
        #[arg(long)]
        ticker: Option<String>,

        /// Only show scans for this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,

        /// Scan history file.
        #[arg(long, default_value = "data/history/scans.jsonl")]
        history: PathBuf,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML.
    Show,
    /// Load a config file and report whether it is valid.
    Validate { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            tickers,
            watchlist,
            strikes,
            data,
            history,
            no_history,
            json,
        } => run_scan_cmd(tickers, watchlist, strikes, data, history, no_history, json),
        Commands::Strikes {
            ticker,
            chain,
            data,
            json,
        } => run_strikes_cmd(&ticker, &chain, data, json),
        Commands::History {
            ticker,
            date,
            history,
        } => run_history_cmd(ticker, date, &history),
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", ScreenerConfig::default().to_toml()?);
                Ok(())
            }
            ConfigAction::Validate { path } => {
                ScreenerConfig::from_file(&path)
                    .with_context(|| format!("invalid config {}", path.display()))?;
                println!("{} is valid", path.display());
                Ok(())
            }
        },
    }
}

fn run_scan_cmd(
    tickers: Vec<String>,
    watchlist: Option<PathBuf>,
    strikes: Vec<String>,
    data: DataArgs,
    history: PathBuf,
    no_history: bool,
    json: bool,
) -> Result<()> {
    let mut all: Vec<String> = tickers.iter().map(|t| t.to_uppercase()).collect();
    if let Some(path) = watchlist {
        for ticker in load_watchlist(&path)? {
            if !all.contains(&ticker) {
                all.push(ticker);
            }
        }
    }
    if all.is_empty() {
        bail!("no tickers given; pass symbols or --watchlist");
    }

    let mut request = scan_request(&data, all)?;
    request.candidate_strikes = parse_strikes(&strikes)?;
    if !no_history {
        request.history_path = Some(history);
    }

    let outcome = execute(&request, &load_config(&data)?, &data)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    } else {
        print_summary(&outcome);
    }
    Ok(())
}

fn run_strikes_cmd(ticker: &str, chain_path: &Path, data: DataArgs, json: bool) -> Result<()> {
    let ticker = ticker.to_uppercase();
    let config = load_config(&data)?;
    let request = scan_request(&data, vec![ticker.clone()])?;
    let outcome = execute(&request, &config, &data)?;
    let result = &outcome.result;

    if !result.allow_new_trades {
        bail!("system state is {}; no new trades", result.system_state);
    }
    let Some(qualified) = result.qualified(&ticker) else {
        let reason = result
            .failed(&ticker)
            .map(|f| format!("{}: {}", f.failing_gate, f.reason))
            .unwrap_or_else(|| "not screened".to_string());
        bail!("{ticker} does not qualify ({reason})");
    };

    let safety = qualified.details.get(&GateId::StructuralSafety);
    let number = |name: &str| safety.and_then(|d| d.get(name)).and_then(|v| v.as_number());
    let (Some(current_price), Some(support_level)) = (number("current_price"), number("min_support"))
    else {
        bail!("{ticker}: structural safety details missing price or support");
    };

    let chain = load_put_chain(chain_path)?;
    let selector = StrikeSelector::new(config.strikes)?;
    let candidates = selector.select(
        &StrikeRequest {
            ticker: ticker.clone(),
            as_of: result.as_of,
            current_price,
            max_safe_strike: qualified.max_safe_strike,
            support_level,
        },
        &chain,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    } else {
        print_candidates(&ticker, qualified.max_safe_strike, &candidates);
    }
    Ok(())
}

fn run_history_cmd(ticker: Option<String>, date: Option<String>, path: &Path) -> Result<()> {
    let history = ScanHistory::new(path);

    if let Some(ticker) = ticker {
        let entries = history.for_ticker(&ticker)?;
        if entries.is_empty() {
            println!("No history for {}", ticker.to_uppercase());
            return Ok(());
        }
        println!("{:<12} {:<18} {:<14} Verdict", "Date", "Scan", "State");
        for entry in entries {
            let verdict = match entry.status {
                TickerStatus::Qualified { max_safe_strike } => {
                    format!("qualified, max strike {max_safe_strike:.2}")
                }
                TickerStatus::Failed { stage, reason } => format!("failed at {stage}: {reason}"),
            };
            println!(
                "{:<12} {:<18} {:<14} {verdict}",
                entry.as_of.to_string(),
                entry.scan_id,
                entry.system_state.to_string()
            );
        }
        return Ok(());
    }

    let records = match date {
        Some(d) => history.for_date(parse_date(&d)?)?,
        None => history.load_all()?,
    };
    if records.is_empty() {
        println!("No scans recorded in {}", path.display());
        return Ok(());
    }
    println!(
        "{:<12} {:<18} {:<14} {:>9} {:>7} {:>7}",
        "Date", "Scan", "State", "Qualified", "Failed", "Alerts"
    );
    for record in records {
        let r = &record.result;
        println!(
            "{:<12} {:<18} {:<14} {:>9} {:>7} {:>7}{}",
            r.as_of.to_string(),
            record.scan_id,
            r.system_state.to_string(),
            r.qualified_tickers.len(),
            r.failed_tickers.len(),
            r.alerts.len(),
            if record.synthetic { "  (synthetic)" } else { "" },
        );
    }
    Ok(())
}

fn load_config(data: &DataArgs) -> Result<ScreenerConfig> {
    match &data.config {
        Some(path) => ScreenerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ScreenerConfig::default()),
    }
}

fn scan_request(data: &DataArgs, tickers: Vec<String>) -> Result<ScanRequest> {
    let mut request = ScanRequest::new(&data.data_dir, tickers);
    request.as_of = data.as_of.as_deref().map(parse_date).transpose()?;
    request.index_symbol = data.index.to_uppercase();
    request.volatility_symbol = data.volatility.to_uppercase();
    request.synthetic = data.synthetic;
    Ok(request)
}

fn execute(request: &ScanRequest, config: &ScreenerConfig, data: &DataArgs) -> Result<ScanOutcome> {
    let provider: Box<dyn OptionsDataProvider> = match &data.options {
        Some(path) => Box::new(FileOptionsProvider::from_file(path)?),
        None => Box::new(NoOptionsProvider),
    };
    Ok(run_scan(request, config, provider.as_ref())?)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn parse_strikes(args: &[String]) -> Result<BTreeMap<String, f64>> {
    let mut strikes = BTreeMap::new();
    for arg in args {
        let Some((ticker, strike)) = arg.split_once('=') else {
            bail!("--strike expects TICKER=STRIKE, got '{arg}'");
        };
        let strike: f64 = strike
            .trim()
            .parse()
            .with_context(|| format!("invalid strike in '{arg}'"))?;
        if !strike.is_finite() || strike <= 0.0 {
            bail!("strike in '{arg}' must be a positive finite price");
        }
        strikes.insert(ticker.trim().to_uppercase(), strike);
    }
    Ok(strikes)
}

fn print_summary(outcome: &ScanOutcome) {
    let r: &ScreeningResult = &outcome.result;
    println!();
    println!("=== Scan {} ({}) ===", outcome.scan_id, r.as_of);
    if outcome.synthetic {
        println!("WARNING: synthetic data used; not for trading decisions");
    }
    println!(
        "System state: {}  (new trades {})",
        r.system_state,
        if r.allow_new_trades { "allowed" } else { "disabled" }
    );
    match r.market_regime.reason() {
        None => println!("Market regime: pass"),
        Some(reason) => println!("Market regime: FAIL ({reason})"),
    }

    if !r.alerts.is_empty() {
        println!();
        println!("Alerts:");
        for alert in &r.alerts {
            println!("  {alert}");
        }
    }
    for skipped in &r.skipped_detectors {
        println!("  skipped {}: {}", skipped.mode, skipped.reason);
    }

    println!();
    println!("Qualified ({}):", r.qualified_tickers.len());
    for q in &r.qualified_tickers {
        println!(
            "  {:<8} max strike {:>9.2}  ({:.1}% below price)",
            q.ticker, q.max_safe_strike, q.discount_pct
        );
    }
    println!("Failed ({}):", r.failed_tickers.len());
    for f in &r.failed_tickers {
        println!("  {:<8} {}: {}", f.ticker, f.failing_gate, f.reason);
    }
    if !outcome.persisted {
        println!();
        println!("Note: result was not saved to history");
    }
}

fn print_candidates(ticker: &str, max_safe_strike: f64, candidates: &[SpreadCandidate]) {
    println!();
    println!("=== {ticker} put credit spreads (max safe strike {max_safe_strike:.2}) ===");
    println!(
        "{:<11} {:>4} {:>8} {:>8} {:>7} {:>7} {:>6} {:>6}",
        "Expiry", "DTE", "Sell", "Buy", "Credit", "ROI%", "PoP%", "Score"
    );
    for c in candidates {
        println!(
            "{:<11} {:>4} {:>8.2} {:>8.2} {:>7.2} {:>7.1} {:>6.1} {:>6.1}",
            c.expiration.to_string(),
            c.dte,
            c.sell_strike,
            c.buy_strike,
            c.credit,
            c.roi_pct,
            c.pop_pct,
            c.score
        );
    }
}
