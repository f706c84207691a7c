//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! No dependencies on the data pipeline or engine loop.

use portsim_core::domain::{EquityPoint, Trade};
use portsim_core::engine::RunResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub starting_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub avg_return_pct: f64,
    pub avg_bars_held: f64,
    pub max_consecutive_losses: usize,
    pub peak_open_positions: usize,
    /// Trades per exit reason (`STOP`, `TIME`, `DATA_END`).
    pub exit_counts: BTreeMap<String, usize>,
    /// Dropped signals per skip reason.
    pub skip_counts: BTreeMap<String, usize>,
}

impl PerformanceMetrics {
    /// Compute all metrics from an engine run.
    pub fn compute(result: &RunResult) -> Self {
        let equity = equity_values(&result.equity_curve);
        let trading_days = equity.len();
        Self {
            starting_capital: result.starting_capital,
            final_equity: result.final_equity(),
            total_return: total_return(&equity),
            cagr: cagr(&equity, trading_days),
            sharpe: sharpe_ratio(&equity, 0.0),
            sortino: sortino_ratio(&equity, 0.0),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(&result.trades),
            profit_factor: profit_factor(&result.trades),
            trade_count: result.trades.len(),
            avg_return_pct: avg_return_pct(&result.trades),
            avg_bars_held: avg_bars_held(&result.trades),
            max_consecutive_losses: max_consecutive_losses(&result.trades),
            peak_open_positions: result.peak_open_positions,
            exit_counts: result
                .exit_counts()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            skip_counts: result
                .skip_counts()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

pub fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.equity).collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (final_eq - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound Annual Growth Rate.
///
/// Assumes 252 trading days per year. Returns 0.0 for single-bar or non-positive equity.
pub fn cagr(equity_curve: &[f64], trading_days: usize) -> f64 {
    if trading_days < 2 {
        return 0.0;
    }
    let (initial, final_eq) = match (equity_curve.first(), equity_curve.last()) {
        (Some(&i), Some(&f)) => (i, f),
        _ => return 0.0,
    };
    if initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / 252.0;
    (final_eq / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / std) * (252.0_f64).sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();

    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / downside_std) * (252.0_f64).sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = match equity_curve.first() {
        Some(&p) => p,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Win rate: fraction of trades with positive net profit.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profit / gross loss.
///
/// 0.0 when there are no losing trades (including no trades at all).
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_profit > 0.0)
        .map(|t| t.net_profit)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_profit < 0.0)
        .map(|t| t.net_profit.abs())
        .sum();

    if gross_loss <= 0.0 {
        return 0.0;
    }
    gross_profit / gross_loss
}

pub fn avg_return_pct(trades: &[Trade]) -> f64 {
    let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
    mean_f64(&returns)
}

pub fn avg_bars_held(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held).sum::<usize>() as f64 / trades.len() as f64
}

/// Longest run of consecutive non-winning trades, in close order.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    let mut best = 0;
    let mut current = 0;
    for t in trades {
        if t.is_winner() {
            current = 0;
        } else {
            current += 1;
            best = best.max(current);
        }
    }
    best
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity points.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
