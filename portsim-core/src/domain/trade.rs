//! Trade — a completed round-trip: entry → exit.

use super::signal::Direction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Trailing stop touched; filled at the stop level.
    Stop,
    /// `max_bars` reached; filled at that bar's close.
    Time,
    /// Bar data ran out before a stop or time exit; filled at the last close.
    DataEnd,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Stop => "STOP",
            ExitReason::Time => "TIME",
            ExitReason::DataEnd => "DATA_END",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed profit of a round trip: `(exit - entry) * shares`, negated for shorts.
pub fn net_profit(direction: Direction, entry_price: f64, exit_price: f64, shares: u64) -> f64 {
    direction.sign() * (exit_price - entry_price) * shares as f64
}

/// A realized trade record.
///
/// `initial_stop` vs `final_stop` shows how far the trailing stop moved in
/// the trade's favour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub direction: Direction,

    // ── Entry ──
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size / PnL ──
    pub shares: u64,
    pub net_profit: f64,
    /// Net profit as a percentage of capital committed (5.0 == 5%).
    pub return_pct: f64,

    // ── Lifecycle ──
    pub bars_held: usize,
    pub initial_stop: f64,
    pub final_stop: f64,
}

impl Trade {
    /// Capital committed at entry.
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.shares as f64
    }

    pub fn is_winner(&self) -> bool {
        self.net_profit > 0.0
    }
}

/// Percentage return on committed capital; zero when nothing was committed.
pub fn return_pct(net_profit: f64, entry_price: f64, shares: u64) -> f64 {
    let committed = entry_price * shares as f64;
    if committed <= 0.0 {
        return 0.0;
    }
    net_profit / committed * 100.0
}
