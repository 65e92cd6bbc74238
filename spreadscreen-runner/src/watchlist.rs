//! Watchlist files: tickers separated by whitespace or commas, `#` starts a
//! comment. Symbols are upper-cased and de-duplicated in first-seen order.

use std::path::Path;

use crate::data_loader::LoadError;

pub fn parse_watchlist(text: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("");
        for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let ticker = token.to_uppercase();
            if !tickers.contains(&ticker) {
                tickers.push(ticker);
            }
        }
    }
    tickers
}

pub fn load_watchlist(path: &Path) -> Result<Vec<String>, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_watchlist(&text))
}
