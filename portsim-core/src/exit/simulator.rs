//! Single-instrument exit simulation.
//!
//! Given one entry signal and the bars strictly after the entry bar, runs a
//! [`TrailingStop`] forward until exactly one exit fires. Rejections
//! (invalid ATR, invalid price, zero shares) are returned as [`SkipReason`]
//! values, never panics or errors.

use crate::domain::trade::{net_profit, return_pct};
use crate::domain::{is_valid_atr, Bar, ExitReason, Signal, SkipReason, Trade};
use crate::exit::TrailingStop;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stop distance and holding limit shared by every trade of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitParams {
    pub multiplier: f64,
    pub max_bars: usize,
}

/// Where and why a single entry exits, independent of position size.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitPath {
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub bars_held: usize,
    pub initial_stop: f64,
    pub final_stop: f64,
    /// Stop level at entry followed by the level after each forward bar.
    pub stop_path: Vec<f64>,
}

/// A sized trade together with its per-bar stop path.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTrade {
    pub trade: Trade,
    pub stop_path: Vec<f64>,
}

/// Whole shares affordable with `dollars` at `price`, truncated toward zero.
///
/// Non-finite or non-positive inputs size to zero.
pub fn size_shares(dollars: f64, price: f64) -> u64 {
    if !dollars.is_finite() || !price.is_finite() || dollars <= 0.0 || price <= 0.0 {
        return 0;
    }
    (dollars / price).floor() as u64
}

fn check_entry(signal: &Signal) -> Result<f64, SkipReason> {
    let atr = match signal.atr {
        Some(atr) if is_valid_atr(signal.atr) => atr,
        _ => return Err(SkipReason::InvalidAtr),
    };
    if !signal.entry_price.is_finite() || signal.entry_price <= 0.0 {
        return Err(SkipReason::InvalidPrice);
    }
    Ok(atr)
}

/// Run the trailing stop forward from `signal` over `forward`.
///
/// `forward` yields the bars after the entry bar paired with their ATR. When
/// the bars run out before a stop or time exit, the trade exits `DATA_END`
/// at the last close, or at the entry price on the entry date if there were
/// no forward bars at all.
pub fn simulate_path<'a, I>(
    signal: &Signal,
    params: &ExitParams,
    forward: I,
) -> Result<ExitPath, SkipReason>
where
    I: IntoIterator<Item = (&'a Bar, Option<f64>)>,
{
    let atr = check_entry(signal)?;
    let mut stop = TrailingStop::new(
        signal.direction,
        signal.entry_price,
        atr,
        params.multiplier,
        params.max_bars,
    );

    let mut stop_path = vec![stop.level()];
    let mut last: Option<(NaiveDate, f64)> = None;

    for (bar, bar_atr) in forward {
        if stop.bars_held() >= params.max_bars {
            break;
        }
        let fill = stop.on_bar(bar, bar_atr);
        stop_path.push(stop.level());
        last = Some((bar.date, bar.close));

        if let Some(fill) = fill {
            return Ok(ExitPath {
                exit_date: bar.date,
                exit_price: fill.price,
                reason: fill.reason,
                bars_held: stop.bars_held(),
                initial_stop: stop.initial_level(),
                final_stop: stop.level(),
                stop_path,
            });
        }
    }

    let (exit_date, exit_price) = last.unwrap_or((signal.date, signal.entry_price));
    Ok(ExitPath {
        exit_date,
        exit_price,
        reason: ExitReason::DataEnd,
        bars_held: stop.bars_held(),
        initial_stop: stop.initial_level(),
        final_stop: stop.level(),
        stop_path,
    })
}

/// Size `signal` with `position_dollar_size` and simulate it to its exit.
pub fn simulate_exit<'a, I>(
    signal: &Signal,
    params: &ExitParams,
    position_dollar_size: f64,
    forward: I,
) -> Result<SimulatedTrade, SkipReason>
where
    I: IntoIterator<Item = (&'a Bar, Option<f64>)>,
{
    check_entry(signal)?;
    let shares = size_shares(position_dollar_size, signal.entry_price);
    if shares == 0 {
        return Err(SkipReason::ZeroShares);
    }

    let path = simulate_path(signal, params, forward)?;
    let profit = net_profit(signal.direction, signal.entry_price, path.exit_price, shares);
    let trade = Trade {
        symbol: signal.symbol.clone(),
        direction: signal.direction,
        entry_date: signal.date,
        entry_price: signal.entry_price,
        exit_date: path.exit_date,
        exit_price: path.exit_price,
        exit_reason: path.reason,
        shares,
        net_profit: profit,
        return_pct: return_pct(profit, signal.entry_price, shares),
        bars_held: path.bars_held,
        initial_stop: path.initial_stop,
        final_stop: path.final_stop,
    };

    Ok(SimulatedTrade {
        trade,
        stop_path: path.stop_path,
    })
}
