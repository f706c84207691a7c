//! Bar loading for the runner.
//!
//! Two [`BarSource`] implementations read the input table:
//! - [`CsvSource`]: streaming row-by-row deserialize with the `csv` crate
//! - [`ParquetSource`]: columnar read with polars, then iterated by row
//!
//! Expected columns: `symbol`, `date` (`YYYY-MM-DD`), `open`, `high`, `low`,
//! `close`, optional `signal` and optional `atr`.

use crate::config::DataFormat;
use chrono::NaiveDate;
use polars::prelude::*;
use portsim_core::data::{BarRow, BarSource, DataError, MarketData};
use portsim_core::domain::SignalFlag;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const REQUIRED_COLUMNS: [&str; 6] = ["symbol", "date", "open", "high", "low", "close"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] PolarsError),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Read a whole input file into [`MarketData`]. ATR is not computed here.
pub fn load_market(path: &Path, format: DataFormat) -> Result<MarketData, LoadError> {
    let market = match format {
        DataFormat::Csv => MarketData::from_source(&mut CsvSource::from_path(path)?)?,
        DataFormat::Parquet => MarketData::from_source(&mut ParquetSource::from_path(path)?)?,
    };
    info!(
        path = %path.display(),
        %format,
        symbols = market.series.len(),
        bars = market.bar_count(),
        "loaded market data"
    );
    Ok(market)
}

fn parse_date(raw: &str, row: usize) -> Result<NaiveDate, DataError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| DataError::Parse {
        row,
        message: format!("bad date '{raw}': {e}"),
    })
}

fn parse_signal(raw: Option<&str>, row: usize) -> Result<SignalFlag, DataError> {
    let raw = raw.unwrap_or("");
    SignalFlag::parse(raw).ok_or_else(|| DataError::Parse {
        row,
        message: format!("bad signal '{raw}'"),
    })
}

// ── CSV ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRecord {
    symbol: String,
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    signal: Option<String>,
    #[serde(default)]
    atr: Option<f64>,
}

impl CsvRecord {
    fn into_row(self, row: usize) -> Result<BarRow, DataError> {
        Ok(BarRow {
            date: parse_date(&self.date, row)?,
            signal: parse_signal(self.signal.as_deref(), row)?,
            symbol: self.symbol.trim().to_string(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            atr: self.atr,
        })
    }
}

/// Streaming CSV reader.
pub struct CsvSource<R: Read = File> {
    reader: csv::Reader<R>,
    description: String,
}

impl CsvSource<File> {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, path.display().to_string())
    }
}

impl<R: Read> CsvSource<R> {
    /// Wrap any reader. Fails if a required column is missing from the header.
    pub fn from_reader(reader: R, description: impl Into<String>) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?;
        for col in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == col) {
                return Err(DataError::MissingColumn(col.to_string()).into());
            }
        }
        Ok(Self {
            reader,
            description: description.into(),
        })
    }
}

impl<R: Read> BarSource for CsvSource<R> {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn rows(&mut self) -> Box<dyn Iterator<Item = Result<BarRow, DataError>> + '_> {
        Box::new(
            self.reader
                .deserialize::<CsvRecord>()
                .enumerate()
                .map(|(i, record)| {
                    // Line 1 is the header.
                    let row = i + 2;
                    record
                        .map_err(|e| DataError::Parse {
                            row,
                            message: e.to_string(),
                        })
                        .and_then(|r| r.into_row(row))
                }),
        )
    }
}

// ── Parquet ──────────────────────────────────────────────────────────

/// Parquet reader. The file is read columnar in one pass; rows are then
/// assembled on iteration.
#[derive(Debug)]
pub struct ParquetSource {
    description: String,
    symbols: Vec<Option<String>>,
    dates: Vec<Option<NaiveDate>>,
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    signals: Option<Vec<Option<String>>>,
    atr: Option<Vec<Option<f64>>>,
}

impl ParquetSource {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let df = ParquetReader::new(file).finish()?;
        Self::from_dataframe(&df, path.display().to_string())
    }

    pub fn from_dataframe(
        df: &DataFrame,
        description: impl Into<String>,
    ) -> Result<Self, LoadError> {
        for col in REQUIRED_COLUMNS {
            if df.column(col).is_err() {
                return Err(DataError::MissingColumn(col.to_string()).into());
            }
        }
        Ok(Self {
            description: description.into(),
            symbols: string_column(df, "symbol")?,
            dates: date_column(df, "date")?,
            open: f64_column(df, "open")?,
            high: f64_column(df, "high")?,
            low: f64_column(df, "low")?,
            close: f64_column(df, "close")?,
            signals: optional(df, "signal", string_column)?,
            atr: optional(df, "atr", f64_column)?,
        })
    }

    fn row(&self, i: usize) -> Result<BarRow, DataError> {
        let row = i + 1;
        let symbol = self.symbols[i].clone().ok_or_else(|| DataError::Parse {
            row,
            message: "null symbol".into(),
        })?;
        let date = self.dates[i].ok_or_else(|| DataError::Parse {
            row,
            message: "null or invalid date".into(),
        })?;
        let signal = match &self.signals {
            Some(col) => parse_signal(col[i].as_deref(), row)?,
            None => SignalFlag::None,
        };
        Ok(BarRow {
            symbol,
            date,
            open: self.open[i].unwrap_or(f64::NAN),
            high: self.high[i].unwrap_or(f64::NAN),
            low: self.low[i].unwrap_or(f64::NAN),
            close: self.close[i].unwrap_or(f64::NAN),
            signal,
            atr: self.atr.as_ref().and_then(|col| col[i]),
        })
    }
}

impl BarSource for ParquetSource {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn rows(&mut self) -> Box<dyn Iterator<Item = Result<BarRow, DataError>> + '_> {
        let source: &ParquetSource = self;
        Box::new((0..source.symbols.len()).map(move |i| source.row(i)))
    }
}

fn optional<T>(
    df: &DataFrame,
    name: &str,
    read: fn(&DataFrame, &str) -> Result<Vec<T>, LoadError>,
) -> Result<Option<Vec<T>>, LoadError> {
    if df.column(name).is_err() {
        return Ok(None);
    }
    read(df, name).map(Some)
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, LoadError> {
    let col = df.column(name)?.cast(&DataType::Float64)?;
    Ok(col.f64()?.into_iter().collect())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, LoadError> {
    let col = df.column(name)?.cast(&DataType::String)?;
    Ok(col
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Dates are accepted as a native `Date` column or as `YYYY-MM-DD` strings.
fn date_column(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>, LoadError> {
    let col = df.column(name)?;
    if col.dtype() == &DataType::Date {
        // NaiveDate::default() is 1970-01-01, the Date column epoch.
        let epoch = NaiveDate::default();
        let days = col.cast(&DataType::Int32)?;
        return Ok(days
            .i32()?
            .into_iter()
            .map(|d| d.and_then(|d| epoch.checked_add_signed(chrono::Duration::days(d as i64))))
            .collect());
    }
    let text = col.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
        .collect())
}
