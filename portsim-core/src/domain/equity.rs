//! Equity curve points.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Portfolio snapshot recorded once per simulated date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// Cash plus mark-to-market value of open positions.
    pub equity: f64,
    pub cash: f64,
    pub open_positions: usize,
}
