//! Backtest runner — wires data loading, ATR, the engine, metrics and costs.
//!
//! The engine itself is single-threaded. The runner parallelizes the
//! per-symbol work in front of it with rayon: ATR computation, and in
//! pre-resolved mode the exit simulation of every candidate. Results are
//! sorted back into stream order before the engine loop consumes them, so
//! the output does not depend on thread scheduling.

use crate::config::{ConfigError, DataFormat, RunConfig};
use crate::costs::{estimate_costs, CostConfig, CostEstimate};
use crate::data_loader::{load_market, LoadError};
use crate::export::ExportError;
use crate::metrics::PerformanceMetrics;
use chrono::NaiveDate;
use portsim_core::domain::{EquityPoint, SkippedSignal, Trade};
use portsim_core::engine::{resolve_symbol_candidates, sort_candidates, ResolvedCandidate};
use portsim_core::exit::ExitParams;
use portsim_core::fingerprint::RunFingerprint;
use portsim_core::indicators::Atr;
use portsim_core::{ExitMode, MarketData, PortfolioEngine, SimulationConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while running a backtest.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid simulation config: {0}")]
    Simulation(#[from] portsim_core::ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
    #[error("failed to fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("symbol '{0}' not found in loaded data")]
    SymbolNotFound(String),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config: SimulationConfig,
    pub fingerprint: RunFingerprint,
    pub metrics: PerformanceMetrics,
    pub costs: Option<CostEstimate>,
    pub signal_count: usize,
    pub admitted_count: usize,
    pub skipped: Vec<SkippedSignal>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load the configured input and run it.
///
/// This is the high-level entry point used by the CLI. Artifacts are not
/// written here; see [`crate::export::save_artifacts`].
pub fn run_backtest(config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let format = config.data.resolved_format()?;
    let market = load_market(&config.data.path, format)?;
    run_on_market(market, &config.simulation, config.costs.as_ref())
}

/// Run on already-loaded market data.
///
/// `market` must hold the input as read: the dataset fingerprint is taken
/// before ATR is filled in.
pub fn run_on_market(
    mut market: MarketData,
    simulation: &SimulationConfig,
    costs: Option<&CostConfig>,
) -> Result<BacktestResult, RunError> {
    let engine = PortfolioEngine::new(simulation.clone())?;
    let fingerprint = RunFingerprint::new(simulation, &market)?;

    info!(
        run_id = %fingerprint.short_id(),
        symbols = fingerprint.symbols,
        bars = fingerprint.bars,
        mode = %simulation.exit_mode,
        "starting run"
    );

    compute_atr_parallel(&mut market, simulation.atr_period);

    let result = match simulation.exit_mode {
        ExitMode::Replay => engine.run(&market, &market.signals()),
        ExitMode::PreResolved => {
            let candidates = resolve_candidates_parallel(&market, &simulation.exit_params());
            engine.run_resolved(&market, &candidates)
        }
    };

    let metrics = PerformanceMetrics::compute(&result);
    let costs = costs.map(|c| estimate_costs(&result.trades, c));

    info!(
        run_id = %fingerprint.short_id(),
        signals = result.signal_count,
        trades = result.trades.len(),
        skipped = result.skipped.len(),
        final_equity = metrics.final_equity,
        "run finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        config: simulation.clone(),
        fingerprint,
        metrics,
        costs,
        signal_count: result.signal_count,
        admitted_count: result.admitted_count,
        skipped: result.skipped,
        trades: result.trades,
        equity_curve: result.equity_curve,
    })
}

/// Fill every symbol's ATR series on the rayon pool.
pub fn compute_atr_parallel(market: &mut MarketData, period: usize) {
    market
        .series
        .par_iter_mut()
        .for_each(|(_, series)| series.compute_atr(period));
}

/// Resolve candidates for every symbol on the rayon pool, then sort them
/// into stream order.
pub fn resolve_candidates_parallel(
    market: &MarketData,
    params: &ExitParams,
) -> Vec<ResolvedCandidate> {
    let mut candidates: Vec<ResolvedCandidate> = market
        .series
        .par_iter()
        .flat_map_iter(|(_, series)| resolve_symbol_candidates(series, params))
        .collect();
    sort_candidates(&mut candidates);
    candidates
}

/// Wilder ATR for one symbol of an input file, computed from its bars.
pub fn atr_series(
    path: &Path,
    format: DataFormat,
    symbol: &str,
    period: usize,
) -> Result<Vec<(NaiveDate, Option<f64>)>, RunError> {
    let market = load_market(path, format)?;
    let series = market
        .get(symbol)
        .ok_or_else(|| RunError::SymbolNotFound(symbol.to_string()))?;
    let atr = Atr::new(period).compute(&series.bars);
    Ok(series.bars.iter().map(|b| b.date).zip(atr).collect())
}
