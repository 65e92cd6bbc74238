//! Domain types: daily bars, immutable per-symbol price series, options metadata.

pub mod bar;
pub mod options;
pub mod series;

pub use bar::Bar;
pub use options::OptionsSnapshot;
pub use series::{PriceSeries, SeriesError};

/// Ticker symbol.
pub type Symbol = String;
