//! Bar ingestion: row sources and the per-symbol market view.

pub mod market;
pub mod source;

pub use market::{MarketData, SymbolSeries};
pub use source::{BarRow, BarSource, DataError, VecSource};
