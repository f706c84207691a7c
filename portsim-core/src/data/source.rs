//! Row-level input abstraction.
//!
//! A [`BarSource`] yields one [`BarRow`] per symbol-bar. File formats live in
//! the runner; the core only consumes rows.

use crate::domain::{Bar, SignalFlag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub signal: SignalFlag,
    /// Externally supplied ATR; overrides the computed series when present.
    #[serde(default)]
    pub atr: Option<f64>,
}

impl BarRow {
    pub fn bar(&self) -> Bar {
        Bar::new(
            self.symbol.clone(),
            self.date,
            self.open,
            self.high,
            self.low,
            self.close,
        )
    }
}

/// Errors raised while reading or validating bar rows.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("{symbol}: dates must be strictly increasing ({previous} followed by {date})")]
    NonIncreasingDate {
        symbol: String,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Streaming supplier of bar rows.
pub trait BarSource {
    /// Short description for logs (usually a path).
    fn describe(&self) -> String;

    /// Iterate the rows in file order.
    fn rows(&mut self) -> Box<dyn Iterator<Item = Result<BarRow, DataError>> + '_>;
}

/// In-memory source, used by tests and by callers that build rows directly.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    rows: Vec<BarRow>,
}

impl VecSource {
    pub fn new(rows: Vec<BarRow>) -> Self {
        Self { rows }
    }
}

impl BarSource for VecSource {
    fn describe(&self) -> String {
        format!("memory ({} rows)", self.rows.len())
    }

    fn rows(&mut self) -> Box<dyn Iterator<Item = Result<BarRow, DataError>> + '_> {
        Box::new(self.rows.iter().cloned().map(Ok))
    }
}
