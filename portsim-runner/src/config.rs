//! Run file configuration.
//!
//! A run file is TOML with a `[simulation]` table (the engine parameters),
//! a `[data]` table naming the input, an `[output]` table and an optional
//! `[costs]` table for the post-hoc cost estimate.

use crate::costs::CostConfig;
use portsim_core::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading or validating a run file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid simulation config: {0}")]
    Invalid(#[from] portsim_core::ConfigError),

    #[error("cannot infer data format from '{0}' (use .csv or .parquet, or set data.format)")]
    UnknownFormat(PathBuf),
}

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Csv,
    Parquet,
}

impl DataFormat {
    /// Infer from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(DataFormat::Csv),
            "parquet" | "pq" => Some(DataFormat::Parquet),
            _ => None,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Csv => f.write_str("csv"),
            DataFormat::Parquet => f.write_str("parquet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<DataFormat>,
}

impl DataConfig {
    /// Explicit format, or the one implied by the extension.
    pub fn resolved_format(&self) -> Result<DataFormat, ConfigError> {
        self.format
            .or_else(|| DataFormat::from_path(&self.path))
            .ok_or_else(|| ConfigError::UnknownFormat(self.path.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub costs: Option<CostConfig>,
}

impl RunConfig {
    /// Parse TOML text. Relative paths are left as written.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a run file. Relative `data.path` and `output.dir` resolve
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.data.path = resolve(base, &config.data.path);
            config.output.dir = resolve(base, &config.output.dir);
        }
        Ok(config)
    }

    /// Validate simulation parameters and the data format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.data.resolved_format()?;
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
