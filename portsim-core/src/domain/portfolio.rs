//! PortfolioState — cash, open positions and realized trades.

use super::position::Position;
use super::trade::Trade;
use std::collections::{BTreeMap, HashMap};

/// Aggregate portfolio state, mutated only by the engine's main loop.
///
/// Positions are keyed by symbol in an ordered map so every pass over them
/// is deterministic. The capital identity
/// `cash + Σ committed(open) + Σ net_profit(closed) == starting_capital`
/// holds after every admission and every exit.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub cash: f64,
    pub starting_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub trades: Vec<Trade>,
}

impl PortfolioState {
    pub fn new(starting_capital: f64) -> Self {
        Self {
            cash: starting_capital,
            starting_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Admit a position: debit its committed capital from cash.
    ///
    /// Returns the position back if the symbol already has one open.
    pub fn open(&mut self, position: Position) -> Result<(), Position> {
        if self.has_position(&position.symbol) {
            return Err(position);
        }
        self.cash -= position.committed();
        self.positions.insert(position.symbol.clone(), position);
        Ok(())
    }

    /// Record a realized trade: credit committed capital plus profit to cash.
    pub fn settle(&mut self, trade: Trade) {
        self.cash += trade.entry_value() + trade.net_profit;
        self.trades.push(trade);
    }

    /// Total capital currently committed to open positions (at entry prices).
    pub fn committed_capital(&self) -> f64 {
        self.positions.values().map(Position::committed).sum()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.net_profit).sum()
    }

    /// Total equity = cash + sum of all position market values.
    ///
    /// Symbols without a price fall back to the position's entry price.
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .map(|(sym, pos)| {
                let price = prices.get(sym).copied().unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Deviation from the capital identity; zero up to float rounding.
    pub fn conservation_residual(&self) -> f64 {
        self.cash + self.committed_capital() + self.realized_pnl() - self.starting_capital
    }
}
