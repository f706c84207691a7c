//! Post-hoc transaction cost estimate over a trade log.
//!
//! Both legs of every round trip pay a per-share commission plus slippage
//! quoted in basis points of traded notional. The estimate is reported next
//! to the run result and never changes the simulated fills.

use portsim_core::domain::Trade;
use serde::{Deserialize, Serialize};

/// Cost assumptions from the `[costs]` section of a run file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Commission per share, charged on entry and on exit.
    pub commission_per_share: f64,
    /// Slippage in basis points of notional (5 = 0.05%), per leg.
    pub slippage_bps: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            commission_per_share: 0.005,
            slippage_bps: 5.0,
        }
    }
}

impl CostConfig {
    /// Commission for both legs of a round trip.
    pub fn commission(&self, trade: &Trade) -> f64 {
        2.0 * self.commission_per_share * trade.shares as f64
    }

    /// Slippage on the entry and exit notional.
    pub fn slippage(&self, trade: &Trade) -> f64 {
        let notional = (trade.entry_price + trade.exit_price) * trade.shares as f64;
        notional * self.slippage_bps / 10_000.0
    }

    /// Estimated cost of one round trip.
    pub fn trade_cost(&self, trade: &Trade) -> f64 {
        self.commission(trade) + self.slippage(trade)
    }
}

/// Aggregate cost estimate for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub config: CostConfig,
    pub total_commission: f64,
    pub total_slippage: f64,
    pub total_cost: f64,
    pub gross_profit: f64,
    pub net_after_costs: f64,
}

pub fn estimate_costs(trades: &[Trade], config: &CostConfig) -> CostEstimate {
    let mut total_commission = 0.0;
    let mut total_slippage = 0.0;
    for t in trades {
        total_commission += config.commission(t);
        total_slippage += config.slippage(t);
    }
    let total_cost = total_commission + total_slippage;
    let gross_profit: f64 = trades.iter().map(|t| t.net_profit).sum();
    CostEstimate {
        config: *config,
        total_commission,
        total_slippage,
        total_cost,
        gross_profit,
        net_after_costs: gross_profit - total_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portsim_core::domain::{Direction, ExitReason};

    fn trade(entry: f64, exit: f64, shares: u64) -> Trade {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Trade {
            symbol: "AAA".into(),
            direction: Direction::Long,
            entry_date: date,
            entry_price: entry,
            exit_date: date,
            exit_price: exit,
            exit_reason: ExitReason::Stop,
            shares,
            net_profit: (exit - entry) * shares as f64,
            return_pct: 0.0,
            bars_held: 1,
            initial_stop: entry * 0.9,
            final_stop: entry * 0.9,
        }
    }

    #[test]
    fn both_legs_are_charged() {
        let config = CostConfig {
            commission_per_share: 0.01,
            slippage_bps: 10.0,
        };
        let t = trade(100.0, 110.0, 1000);
        // commission 2 * 0.01 * 1000 = 20, slippage (100 + 110) * 1000 * 0.001 = 210
        assert!((config.trade_cost(&t) - 230.0).abs() < 1e-9);

        let est = estimate_costs(&[t], &config);
        assert!((est.total_commission - 20.0).abs() < 1e-9);
        assert!((est.total_slippage - 210.0).abs() < 1e-9);
        assert!((est.gross_profit - 10_000.0).abs() < 1e-9);
        assert!((est.net_after_costs - 9_770.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_totals_match_per_trade_costs() {
        let config = CostConfig::default();
        let trades = [trade(100.0, 110.0, 1000), trade(37.5, 36.0, 333)];
        let est = estimate_costs(&trades, &config);
        let per_trade: f64 = trades.iter().map(|t| config.trade_cost(t)).sum();
        assert!((est.total_cost - per_trade).abs() < 1e-9);
        assert!((est.total_commission + est.total_slippage - est.total_cost).abs() < 1e-9);
    }

    #[test]
    fn zero_cost_config_leaves_profit_untouched() {
        let config = CostConfig {
            commission_per_share: 0.0,
            slippage_bps: 0.0,
        };
        let est = estimate_costs(&[trade(50.0, 45.0, 10)], &config);
        assert_eq!(est.total_cost, 0.0);
        assert_eq!(est.net_after_costs, -50.0);
    }

    #[test]
    fn empty_log() {
        let est = estimate_costs(&[], &CostConfig::default());
        assert_eq!(est.total_cost, 0.0);
        assert_eq!(est.net_after_costs, 0.0);
    }
}
