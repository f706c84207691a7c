//! Signals — externally supplied entry instructions — and the reasons a
//! signal can fail to become a position.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short. Multiplies price deltas into PnL.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// An ATR value usable for stop placement: present, finite and positive.
///
/// A missing or zero ATR is never treated as a zero stop distance.
pub fn is_valid_atr(atr: Option<f64>) -> bool {
    matches!(atr, Some(v) if v.is_finite() && v > 0.0)
}

/// An entry instruction for one symbol at one date.
///
/// `entry_price` is the close of the signal bar and `bar_index` locates that
/// bar inside the symbol's series so forward bars can be found without a
/// date search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub date: NaiveDate,
    pub direction: Direction,
    pub atr: Option<f64>,
    pub entry_price: f64,
    pub bar_index: usize,
}

impl Signal {
    pub fn has_valid_atr(&self) -> bool {
        is_valid_atr(self.atr)
    }

    /// ATR used for ordering; invalid ATRs sort last.
    pub fn atr_rank(&self) -> f64 {
        match self.atr {
            Some(v) if v.is_finite() => v,
            _ => f64::NEG_INFINITY,
        }
    }

    /// Processing order of the signal stream: date ascending, then ATR
    /// descending, then symbol ascending.
    pub fn stream_order(a: &Signal, b: &Signal) -> Ordering {
        a.date
            .cmp(&b.date)
            .then_with(|| b.atr_rank().total_cmp(&a.atr_rank()))
            .then_with(|| a.symbol.cmp(&b.symbol))
    }
}

/// Why a signal produced no position.
///
/// These are data-quality and capacity outcomes, not errors: the run
/// continues and the skip is recorded for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// ATR at signal time missing, zero, negative or non-finite.
    InvalidAtr,
    /// Entry price not a positive finite number.
    InvalidPrice,
    /// Open position count already at `max_positions`.
    PortfolioFull,
    /// Symbol already holds an open position (or an unresolved candidate).
    DuplicateSymbol,
    /// Sized position buys less than one share.
    ZeroShares,
    /// Position cost exceeds available cash.
    InsufficientCash,
    /// Signal dated after the last bar of the run.
    NoBar,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::InvalidAtr => "INVALID_ATR",
            SkipReason::InvalidPrice => "INVALID_PRICE",
            SkipReason::PortfolioFull => "PORTFOLIO_FULL",
            SkipReason::DuplicateSymbol => "DUPLICATE_SYMBOL",
            SkipReason::ZeroShares => "ZERO_SHARES",
            SkipReason::InsufficientCash => "INSUFFICIENT_CASH",
            SkipReason::NoBar => "NO_BAR",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signal that was dropped, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSignal {
    pub symbol: String,
    pub date: NaiveDate,
    pub direction: Direction,
    pub reason: SkipReason,
}

impl SkippedSignal {
    pub fn new(signal: &Signal, reason: SkipReason) -> Self {
        Self {
            symbol: signal.symbol.clone(),
            date: signal.date,
            direction: signal.direction,
            reason,
        }
    }
}
