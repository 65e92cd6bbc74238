//! Put-chain CSV loading for strike selection.
//!
//! Header: `expiration,strike,bid,ask,delta,volume,open_interest`. An empty
//! `delta` cell means the greek is unknown.

use std::path::Path;

use spreadscreen_core::PutQuote;

use crate::data_loader::LoadError;

pub fn load_put_chain(path: &Path) -> Result<Vec<PutQuote>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    reader
        .deserialize::<PutQuote>()
        .map(|row| {
            row.map_err(|source| LoadError::Csv {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}
