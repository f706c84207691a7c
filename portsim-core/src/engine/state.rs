//! Run result types.

use crate::domain::{EquityPoint, ExitReason, SkipReason, SkippedSignal, Trade};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one engine run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Realized trades in the order they closed.
    pub trades: Vec<Trade>,
    /// One point per distinct bar date.
    pub equity_curve: Vec<EquityPoint>,
    /// Dropped signals in the order they were considered.
    pub skipped: Vec<SkippedSignal>,
    pub starting_capital: f64,
    /// Cash after every position has been closed.
    pub final_cash: f64,
    /// Signals offered to the admission pass.
    pub signal_count: usize,
    pub admitted_count: usize,
    /// Highest open-position count seen at any equity point.
    pub peak_open_positions: usize,
}

impl RunResult {
    /// Equity at the last recorded point, or starting capital for an empty run.
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.starting_capital)
    }

    pub fn net_profit(&self) -> f64 {
        self.trades.iter().map(|t| t.net_profit).sum()
    }

    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.skipped {
            *counts.entry(s.reason).or_insert(0) += 1;
        }
        counts
    }

    pub fn exit_counts(&self) -> BTreeMap<ExitReason, usize> {
        let mut counts = BTreeMap::new();
        for t in &self.trades {
            *counts.entry(t.exit_reason).or_insert(0) += 1;
        }
        counts
    }
}
