//! Exit pass: close positions whose exit condition fires at a date.

use crate::data::MarketData;
use crate::domain::{ExitReason, PortfolioState};
use chrono::NaiveDate;
use tracing::debug;

/// Remove `symbol` from the open book and settle it.
fn close(
    state: &mut PortfolioState,
    symbol: &str,
    exit_date: NaiveDate,
    exit_price: f64,
    reason: ExitReason,
) {
    let Some(position) = state.positions.remove(symbol) else {
        return;
    };
    let (bars_held, final_stop) = match &position.planned_exit {
        Some(path) => (path.bars_held, path.final_stop),
        None => (position.bars_held(), position.current_stop()),
    };
    let trade = position.close(exit_date, exit_price, reason, bars_held, final_stop);
    debug!(
        symbol = %trade.symbol,
        direction = %trade.direction,
        reason = %trade.exit_reason,
        exit_date = %trade.exit_date,
        exit_price = trade.exit_price,
        net_profit = trade.net_profit,
        "closed position"
    );
    state.settle(trade);
}

/// Advance every open position's trailing stop by its bar at `date`.
///
/// A symbol without a bar at `date` is left alone unless its data has run
/// out, in which case it closes `DATA_END` at its last close. A position
/// whose bar at `date` is the symbol's final bar also closes `DATA_END`
/// when no stop or time exit fired.
pub fn replay_exits(state: &mut PortfolioState, market: &MarketData, date: NaiveDate) {
    let symbols: Vec<String> = state.positions.keys().cloned().collect();
    for symbol in symbols {
        let Some(series) = market.get(&symbol) else {
            continue;
        };

        match series.index_of(date) {
            Some(i) => {
                let bar = &series.bars[i];
                let fill = match state.positions.get_mut(&symbol) {
                    Some(position) => position.stop.on_bar(bar, series.atr_at(i)),
                    None => continue,
                };
                if let Some(fill) = fill {
                    close(state, &symbol, date, fill.price, fill.reason);
                } else if series.is_last_index(i) {
                    close(state, &symbol, date, bar.close, ExitReason::DataEnd);
                }
            }
            None => {
                if let Some(last) = series.last_bar().filter(|b| b.date < date) {
                    close(state, &symbol, last.date, last.close, ExitReason::DataEnd);
                }
            }
        }
    }
}

/// Apply predetermined exits dated at or before `date`.
pub fn apply_planned_exits(state: &mut PortfolioState, date: NaiveDate) {
    let due: Vec<(String, NaiveDate, f64, ExitReason)> = state
        .positions
        .iter()
        .filter_map(|(symbol, position)| {
            let path = position.planned_exit.as_ref()?;
            (path.exit_date <= date).then(|| {
                (
                    symbol.clone(),
                    path.exit_date,
                    path.exit_price,
                    path.reason,
                )
            })
        })
        .collect();

    for (symbol, exit_date, exit_price, reason) in due {
        close(state, &symbol, exit_date, exit_price, reason);
    }
}

/// Close everything still open after the last date.
///
/// Positions with a predetermined exit take it; the rest close `DATA_END`
/// at their symbol's last close.
pub fn force_close_all(state: &mut PortfolioState, market: &MarketData) {
    let symbols: Vec<String> = state.positions.keys().cloned().collect();
    for symbol in symbols {
        let planned = state
            .positions
            .get(&symbol)
            .and_then(|p| p.planned_exit.as_ref())
            .map(|path| (path.exit_date, path.exit_price, path.reason));

        let exit = planned.or_else(|| {
            let position = state.positions.get(&symbol)?;
            let last = market.get(&symbol).and_then(|s| s.last_bar());
            Some(match last {
                Some(bar) => (bar.date, bar.close, ExitReason::DataEnd),
                None => (position.entry_date, position.entry_price, ExitReason::DataEnd),
            })
        });

        if let Some((exit_date, exit_price, reason)) = exit {
            close(state, &symbol, exit_date, exit_price, reason);
        }
    }
}
