//! portsim runner — file formats, run orchestration, metrics, artifacts.
//!
//! This crate builds on `portsim-core` to provide:
//! - TOML run configuration
//! - CSV and Parquet bar sources
//! - Rayon-parallel ATR and candidate pre-resolution in front of the engine
//! - Summary metrics and a post-hoc cost estimate
//! - Artifact export (manifest, trade log, equity curve, report)

pub mod config;
pub mod costs;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use config::{ConfigError, DataConfig, DataFormat, OutputConfig, RunConfig};
pub use costs::{estimate_costs, CostConfig, CostEstimate};
pub use data_loader::{load_market, CsvSource, LoadError, ParquetSource};
pub use export::{load_manifest, save_artifacts, ExportError, Manifest};
pub use metrics::PerformanceMetrics;
pub use runner::{atr_series, run_backtest, run_on_market, BacktestResult, RunError, SCHEMA_VERSION};
