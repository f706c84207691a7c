//! Portfolio admission and lifecycle engine.
//!
//! The engine walks the sorted union of bar dates and, per date, runs:
//!
//! 1. Exit pass: replayed trailing stops or predetermined exits
//! 2. Admission pass: capacity, uniqueness and sizing checks per candidate
//! 3. Equity recording: one `EquityPoint` per date

pub mod admission;
pub mod candidates;
pub mod config;
pub mod lifecycle;
pub mod loop_runner;
pub mod state;

pub use admission::admit;
pub use candidates::{
    resolve_candidates, resolve_symbol_candidates, sort_candidates, ResolvedCandidate,
};
pub use config::{ConfigError, ExitMode, SimulationConfig};
pub use loop_runner::PortfolioEngine;
pub use state::RunResult;
