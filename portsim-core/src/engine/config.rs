//! Simulation parameters and their validation.

use crate::exit::ExitParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How open positions find their exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMode {
    /// Advance each open position's trailing stop bar by bar inside the loop.
    #[default]
    Replay,
    /// Resolve every candidate's exit up front; the loop only applies them.
    PreResolved,
}

impl std::fmt::Display for ExitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitMode::Replay => f.write_str("replay"),
            ExitMode::PreResolved => f.write_str("pre_resolved"),
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("starting_capital must be positive and finite, got {0}")]
    StartingCapital(f64),
    #[error("max_positions must be at least 1")]
    MaxPositions,
    #[error("position_size_pct must be in (0, 1], got {0}")]
    PositionSizePct(f64),
    #[error("atr_period must be at least 1")]
    AtrPeriod,
    #[error("atr_multiplier must be positive and finite, got {0}")]
    AtrMultiplier(f64),
    #[error("max_bars must be at least 1")]
    MaxBars,
}

/// Parameters of one simulation run. Passed by value into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub starting_capital: f64,
    pub max_positions: usize,
    /// Fraction of current equity allocated to each new position.
    pub position_size_pct: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub max_bars: usize,
    pub exit_mode: ExitMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_capital: 1_000_000.0,
            max_positions: 10,
            position_size_pct: 0.10,
            atr_period: 30,
            atr_multiplier: 5.0,
            max_bars: 20,
            exit_mode: ExitMode::Replay,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.starting_capital.is_finite() && self.starting_capital > 0.0) {
            return Err(ConfigError::StartingCapital(self.starting_capital));
        }
        if self.max_positions == 0 {
            return Err(ConfigError::MaxPositions);
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return Err(ConfigError::PositionSizePct(self.position_size_pct));
        }
        if self.atr_period == 0 {
            return Err(ConfigError::AtrPeriod);
        }
        if !(self.atr_multiplier.is_finite() && self.atr_multiplier > 0.0) {
            return Err(ConfigError::AtrMultiplier(self.atr_multiplier));
        }
        if self.max_bars == 0 {
            return Err(ConfigError::MaxBars);
        }
        Ok(())
    }

    pub fn exit_params(&self) -> ExitParams {
        ExitParams {
            multiplier: self.atr_multiplier,
            max_bars: self.max_bars,
        }
    }
}
