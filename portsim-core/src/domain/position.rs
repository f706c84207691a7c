//! Position — one admitted, currently open trade.

use super::signal::Direction;
use super::trade::{net_profit, return_pct, ExitReason, Trade};
use crate::exit::{ExitPath, TrailingStop};
use chrono::NaiveDate;

/// An open position owned by the portfolio engine.
///
/// Created only by admission and consumed by [`Position::close`]. The
/// trailing stop inside `stop` ratchets toward the market and never relaxes.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: u64,
    pub stop: TrailingStop,
    /// Exit computed ahead of time (pre-resolved mode only).
    pub planned_exit: Option<ExitPath>,
}

impl Position {
    /// Capital committed at entry: `entry_price × shares`.
    pub fn committed(&self) -> f64 {
        self.entry_price * self.shares as f64
    }

    pub fn current_stop(&self) -> f64 {
        self.stop.level()
    }

    pub fn bars_held(&self) -> usize {
        self.stop.bars_held()
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        net_profit(self.direction, self.entry_price, mark, self.shares)
    }

    /// Value of the position marked at `mark`.
    ///
    /// Long: `mark × shares`. Short: committed capital plus the unrealized
    /// gain, so a short marked at its entry price is worth what it cost.
    pub fn market_value(&self, mark: f64) -> f64 {
        self.committed() + self.unrealized_pnl(mark)
    }

    /// Convert into a realized trade.
    pub fn close(
        self,
        exit_date: NaiveDate,
        exit_price: f64,
        exit_reason: ExitReason,
        bars_held: usize,
        final_stop: f64,
    ) -> Trade {
        let profit = net_profit(self.direction, self.entry_price, exit_price, self.shares);
        Trade {
            return_pct: return_pct(profit, self.entry_price, self.shares),
            symbol: self.symbol,
            direction: self.direction,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            exit_date,
            exit_price,
            exit_reason,
            shares: self.shares,
            net_profit: profit,
            bars_held,
            initial_stop: self.stop.initial_level(),
            final_stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(direction: Direction) -> Position {
        Position {
            symbol: "SPY".into(),
            direction,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            entry_price: 100.0,
            shares: 10,
            stop: TrailingStop::new(direction, 100.0, 2.0, 5.0, 20),
            planned_exit: None,
        }
    }

    #[test]
    fn long_market_value_is_mark_times_shares() {
        let pos = position(Direction::Long);
        assert_eq!(pos.committed(), 1_000.0);
        assert_eq!(pos.market_value(110.0), 1_100.0);
    }

    #[test]
    fn short_market_value_gains_when_price_falls() {
        let pos = position(Direction::Short);
        assert_eq!(pos.market_value(100.0), 1_000.0);
        assert_eq!(pos.market_value(90.0), 1_100.0);
        assert_eq!(pos.market_value(110.0), 900.0);
    }

    #[test]
    fn close_builds_trade_with_stops() {
        let pos = position(Direction::Long);
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let trade = pos.close(date, 95.0, ExitReason::Stop, 6, 95.0);
        assert_eq!(trade.net_profit, -50.0);
        assert!((trade.return_pct - (-5.0)).abs() < 1e-12);
        assert_eq!(trade.initial_stop, 90.0);
        assert_eq!(trade.final_stop, 95.0);
        assert_eq!(trade.bars_held, 6);
    }
}
