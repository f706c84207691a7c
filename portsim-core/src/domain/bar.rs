//! Bar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// OHLC bar for a single symbol on a single trading date.
///
/// Bars are immutable once ingested and arrive in strictly increasing date
/// order per symbol (enforced by `MarketData` at ingestion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Per-row entry indicator carried by the input table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalFlag {
    #[default]
    None,
    Long,
    Short,
}

impl SignalFlag {
    /// Parse the textual forms found in signal columns.
    ///
    /// Accepts `none`/`long`/`short` (any case), empty, and the numeric
    /// forms `0`, `1`, `-1`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "0" | "0.0" => Some(SignalFlag::None),
            "long" | "1" | "1.0" | "buy" => Some(SignalFlag::Long),
            "short" | "-1" | "-1.0" | "sell" => Some(SignalFlag::Short),
            _ => None,
        }
    }

    pub fn is_entry(self) -> bool {
        self != SignalFlag::None
    }
}
