//! Date-by-date portfolio loop — the heart of the engine.
//!
//! Three phases per distinct bar date:
//! 1. Exit pass: close positions whose exit fires at this date
//! 2. Admission pass: same-date candidates in ATR-descending order
//! 3. Equity recording: cash plus mark-to-market of open positions
//!
//! After the last date any open position is force-closed and signals
//! dated past it are skipped as `NO_BAR`.

use super::admission::admit;
use super::candidates::{resolve_candidates, sort_candidates, ResolvedCandidate};
use super::config::{ConfigError, ExitMode, SimulationConfig};
use super::lifecycle::{apply_planned_exits, force_close_all, replay_exits};
use super::state::RunResult;
use crate::data::MarketData;
use crate::domain::{EquityPoint, PortfolioState, Signal, SkipReason, SkippedSignal};
use crate::exit::ExitPath;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

/// Tolerance for the capital identity, relative to starting capital.
const CONSERVATION_TOLERANCE: f64 = 1e-9;

/// An admission candidate: a signal plus, in pre-resolved mode, its exit.
struct Candidate<'a> {
    signal: &'a Signal,
    planned: Option<&'a Result<ExitPath, SkipReason>>,
}

/// Portfolio admission and lifecycle engine.
///
/// Single-threaded reducer over the time-ordered signal stream. Holds only
/// the validated configuration; every run owns a fresh [`PortfolioState`].
#[derive(Debug, Clone)]
pub struct PortfolioEngine {
    config: SimulationConfig,
}

impl PortfolioEngine {
    /// Validate `config` and build an engine. No simulation happens with an
    /// invalid configuration.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run over `market` in the configured exit mode.
    ///
    /// ATR must already be present on `market` (see
    /// [`MarketData::compute_atr`]). Pre-resolution runs sequentially here;
    /// the runner resolves symbols in parallel and calls [`Self::run_resolved`].
    pub fn simulate(&self, market: &MarketData) -> RunResult {
        match self.config.exit_mode {
            ExitMode::Replay => self.run(market, &market.signals()),
            ExitMode::PreResolved => {
                let candidates = resolve_candidates(market, &self.config.exit_params());
                self.run_resolved(market, &candidates)
            }
        }
    }

    /// Live replay: every open position's trailing stop advances bar by bar.
    pub fn run(&self, market: &MarketData, signals: &[Signal]) -> RunResult {
        let mut ordered: Vec<&Signal> = signals.iter().collect();
        ordered.sort_by(|a, b| Signal::stream_order(a, b));
        let candidates: Vec<Candidate<'_>> = ordered
            .into_iter()
            .map(|signal| Candidate {
                signal,
                planned: None,
            })
            .collect();
        self.run_loop(market, &candidates, ExitMode::Replay)
    }

    /// Pre-resolved: each admitted candidate exits at its predetermined
    /// exit once the loop reaches that date.
    pub fn run_resolved(&self, market: &MarketData, candidates: &[ResolvedCandidate]) -> RunResult {
        let mut sorted = candidates.to_vec();
        sort_candidates(&mut sorted);
        let candidates: Vec<Candidate<'_>> = sorted
            .iter()
            .map(|c| Candidate {
                signal: &c.signal,
                planned: Some(&c.exit),
            })
            .collect();
        self.run_loop(market, &candidates, ExitMode::PreResolved)
    }

    fn run_loop(
        &self,
        market: &MarketData,
        candidates: &[Candidate<'_>],
        mode: ExitMode,
    ) -> RunResult {
        let config = &self.config;
        let timeline = market.timeline();
        let mut state = PortfolioState::new(config.starting_capital);
        let mut equity_curve = Vec::with_capacity(timeline.len());
        let mut skipped = Vec::new();
        let mut admitted_count = 0usize;
        let mut peak_open_positions = 0usize;
        let mut cursor = 0usize;

        for &date in &timeline {
            // ─── Phase 1: exits ───
            match mode {
                ExitMode::Replay => replay_exits(&mut state, market, date),
                ExitMode::PreResolved => apply_planned_exits(&mut state, date),
            }

            // ─── Phase 2: admissions ───
            let marks = marks_at(&state, market, date);
            let equity = state.equity(&marks);
            while cursor < candidates.len() && candidates[cursor].signal.date <= date {
                let candidate = &candidates[cursor];
                cursor += 1;

                let outcome = match candidate.planned {
                    Some(Err(reason)) => Err(*reason),
                    Some(Ok(path)) => {
                        admit(&mut state, candidate.signal, Some(path.clone()), equity, config)
                    }
                    None => admit(&mut state, candidate.signal, None, equity, config),
                };
                match outcome {
                    Ok(shares) => {
                        admitted_count += 1;
                        debug!(
                            symbol = %candidate.signal.symbol,
                            direction = %candidate.signal.direction,
                            date = %date,
                            price = candidate.signal.entry_price,
                            shares,
                            "admitted position"
                        );
                    }
                    Err(reason) => {
                        debug!(
                            symbol = %candidate.signal.symbol,
                            date = %candidate.signal.date,
                            reason = %reason,
                            "skipped signal"
                        );
                        skipped.push(SkippedSignal::new(candidate.signal, reason));
                    }
                }
            }

            // ─── Phase 3: equity ───
            let marks = marks_at(&state, market, date);
            let open_positions = state.open_count();
            peak_open_positions = peak_open_positions.max(open_positions);
            equity_curve.push(EquityPoint {
                date,
                equity: state.equity(&marks),
                cash: state.cash,
                open_positions,
            });

            debug_assert!(
                state.conservation_residual().abs()
                    <= CONSERVATION_TOLERANCE * config.starting_capital.max(1.0),
                "capital identity violated at {date}"
            );
        }

        force_close_all(&mut state, market);

        for candidate in &candidates[cursor..] {
            debug!(
                symbol = %candidate.signal.symbol,
                date = %candidate.signal.date,
                "signal after last bar"
            );
            skipped.push(SkippedSignal::new(candidate.signal, SkipReason::NoBar));
        }

        debug!(
            trades = state.trades.len(),
            skipped = skipped.len(),
            final_cash = state.cash,
            "engine run complete"
        );

        RunResult {
            trades: state.trades,
            equity_curve,
            skipped,
            starting_capital: config.starting_capital,
            final_cash: state.cash,
            signal_count: candidates.len(),
            admitted_count,
            peak_open_positions,
        }
    }
}

/// Close prices at `date` for every open position whose symbol has a bar there.
fn marks_at(state: &PortfolioState, market: &MarketData, date: NaiveDate) -> HashMap<String, f64> {
    state
        .positions
        .keys()
        .filter_map(|symbol| {
            let bar = market.get(symbol)?.bar_at(date)?;
            Some((symbol.clone(), bar.close))
        })
        .collect()
}
