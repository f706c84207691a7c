//! portsim core — domain types, ATR, exit simulation, portfolio engine.
//!
//! This crate contains the heart of the backtest:
//! - Domain types (bars, signals, positions, trades, portfolio state)
//! - Wilder ATR
//! - Single-instrument exit simulator (ATR trailing stop + time limit)
//! - Portfolio admission and lifecycle engine with a per-date loop
//! - Row-level data abstraction (`BarSource`) and run fingerprints
//!
//! File formats, metrics and artifact export live in `portsim-runner`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod exit;
pub mod fingerprint;
pub mod indicators;

pub use data::{BarRow, BarSource, DataError, MarketData, SymbolSeries, VecSource};
pub use engine::{ConfigError, ExitMode, PortfolioEngine, RunResult, SimulationConfig};
