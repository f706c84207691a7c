//! Single-instrument exit simulation.
//!
//! - `ratchet`: stop level that may tighten, never loosen
//! - `trailing`: per-bar ATR trailing stop + time limit state machine
//! - `simulator`: run one entry forward to exactly one exit
//!
//! The portfolio engine drives the same `TrailingStop` bar by bar in replay
//! mode, so standalone simulation and live replay share one implementation.

pub mod ratchet;
pub mod simulator;
pub mod trailing;

pub use ratchet::RatchetState;
pub use simulator::{
    simulate_exit, simulate_path, size_shares, ExitParams, ExitPath, SimulatedTrade,
};
pub use trailing::{ExitFill, TrailingStop};
