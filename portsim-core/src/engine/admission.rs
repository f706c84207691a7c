//! Admission of same-date candidates into the portfolio.

use super::config::SimulationConfig;
use crate::domain::{PortfolioState, Position, Signal, SkipReason};
use crate::exit::{size_shares, ExitPath, TrailingStop};

/// Try to open a position for `signal`.
///
/// Checks run in a fixed order: ATR validity, price validity, capacity,
/// symbol uniqueness, share count, then available cash. `equity` is the
/// portfolio's mark-to-market value after this date's exit pass.
pub fn admit(
    state: &mut PortfolioState,
    signal: &Signal,
    planned_exit: Option<ExitPath>,
    equity: f64,
    config: &SimulationConfig,
) -> Result<u64, SkipReason> {
    let atr = match signal.atr {
        Some(atr) if signal.has_valid_atr() => atr,
        _ => return Err(SkipReason::InvalidAtr),
    };
    if !signal.entry_price.is_finite() || signal.entry_price <= 0.0 {
        return Err(SkipReason::InvalidPrice);
    }
    if state.open_count() >= config.max_positions {
        return Err(SkipReason::PortfolioFull);
    }
    if state.has_position(&signal.symbol) {
        return Err(SkipReason::DuplicateSymbol);
    }

    let shares = size_shares(equity * config.position_size_pct, signal.entry_price);
    if shares == 0 {
        return Err(SkipReason::ZeroShares);
    }
    if signal.entry_price * shares as f64 > state.cash {
        return Err(SkipReason::InsufficientCash);
    }

    let position = Position {
        symbol: signal.symbol.clone(),
        direction: signal.direction,
        entry_date: signal.date,
        entry_price: signal.entry_price,
        shares,
        stop: TrailingStop::new(
            signal.direction,
            signal.entry_price,
            atr,
            config.atr_multiplier,
            config.max_bars,
        ),
        planned_exit,
    };
    state
        .open(position)
        .map_err(|_| SkipReason::DuplicateSymbol)?;
    Ok(shares)
}
