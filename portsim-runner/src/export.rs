//! Reporting and export — CSV, JSON and Markdown artifact generation.
//!
//! A saved run directory holds:
//! - `manifest.json`: schema version, config, fingerprint, metrics, costs
//! - `trades.csv`: the trade log
//! - `equity.csv`: one row per simulated date
//! - `skipped.csv`: every dropped signal with its reason
//! - `report.md`: human-readable summary
//!
//! The manifest carries a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

use portsim_core::domain::{EquityPoint, SkippedSignal, Trade};
use portsim_core::fingerprint::RunFingerprint;
use portsim_core::SimulationConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::costs::CostEstimate;
use crate::metrics::PerformanceMetrics;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
}

/// Run summary persisted as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config: SimulationConfig,
    pub fingerprint: RunFingerprint,
    pub metrics: PerformanceMetrics,
    pub costs: Option<CostEstimate>,
    pub signal_count: usize,
    pub admitted_count: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Manifest {
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            schema_version: result.schema_version,
            config: result.config.clone(),
            fingerprint: result.fingerprint.clone(),
            metrics: result.metrics.clone(),
            costs: result.costs.clone(),
            signal_count: result.signal_count,
            admitted_count: result.admitted_count,
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_manifest_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&Manifest::from_result(result))?)
}

/// Parse a manifest, rejecting schema versions newer than this build.
pub fn import_manifest_json(json: &str) -> Result<Manifest, ExportError> {
    let manifest: Manifest = serde_json::from_str(json)?;
    if manifest.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: manifest.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(manifest)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(data)?)
}

/// Export the trade log as CSV.
///
/// Columns: symbol, direction, entry_date, entry_price, exit_date,
/// exit_price, shares, net_profit, return_pct, exit_reason, bars_held,
/// initial_stop, final_stop
pub fn export_trades_csv(trades: &[Trade]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "direction",
        "entry_date",
        "entry_price",
        "exit_date",
        "exit_price",
        "shares",
        "net_profit",
        "return_pct",
        "exit_reason",
        "bars_held",
        "initial_stop",
        "final_stop",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.symbol,
            &t.direction.to_string(),
            &t.entry_date.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_date.to_string(),
            &format!("{:.6}", t.exit_price),
            &t.shares.to_string(),
            &format!("{:.2}", t.net_profit),
            &format!("{:.4}", t.return_pct),
            &t.exit_reason.to_string(),
            &t.bars_held.to_string(),
            &format!("{:.6}", t.initial_stop),
            &format!("{:.6}", t.final_stop),
        ])?;
    }

    finish(wtr)
}

/// Export the equity curve as CSV: date, equity, cash, open_positions.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity", "cash", "open_positions"])?;
    for p in equity_curve {
        wtr.write_record([
            &p.date.to_string(),
            &format!("{:.2}", p.equity),
            &format!("{:.2}", p.cash),
            &p.open_positions.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Export dropped signals as CSV: symbol, date, direction, reason.
pub fn export_skipped_csv(skipped: &[SkippedSignal]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["symbol", "date", "direction", "reason"])?;
    for s in skipped {
        wtr.write_record([
            &s.symbol,
            &s.date.to_string(),
            &s.direction.to_string(),
            &s.reason.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a run under `output_dir/run_{short_id}/`.
///
/// The directory name comes from the run fingerprint, so re-running the same
/// config on the same data overwrites the same directory with identical
/// bytes. Returns the path to the run directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let run_dir = output_dir.join(format!("run_{}", result.fingerprint.short_id()));
    std::fs::create_dir_all(&run_dir).map_err(|source| ExportError::Io {
        path: run_dir.clone(),
        source,
    })?;

    write(&run_dir.join("manifest.json"), &export_manifest_json(result)?)?;
    write(&run_dir.join("trades.csv"), &export_trades_csv(&result.trades)?)?;
    write(&run_dir.join("equity.csv"), &export_equity_csv(&result.equity_curve)?)?;
    write(&run_dir.join("skipped.csv"), &export_skipped_csv(&result.skipped)?)?;
    write(&run_dir.join("report.md"), &generate_report(result))?;

    info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

fn write(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the manifest of a saved run directory.
pub fn load_manifest(dir: &Path) -> Result<Manifest, ExportError> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    import_manifest_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let c = &result.config;
    let f = &result.fingerprint;
    let m = &result.metrics;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", f.run_id));
    if let (Some(first), Some(last)) = (f.first_date, f.last_date) {
        md.push_str(&format!("| Period | {first} to {last} |\n"));
    }
    md.push_str(&format!("| Symbols | {} |\n", f.symbols));
    md.push_str(&format!("| Bars | {} |\n", f.bars));
    md.push_str(&format!(
        "| Signals | {} ({} admitted) |\n",
        result.signal_count, result.admitted_count
    ));
    md.push('\n');

    md.push_str("## Parameters\n\n");
    md.push_str("| Parameter | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Starting Capital | ${:.0} |\n", c.starting_capital));
    md.push_str(&format!("| Max Positions | {} |\n", c.max_positions));
    md.push_str(&format!("| Position Size | {:.1}% |\n", c.position_size_pct * 100.0));
    md.push_str(&format!("| ATR Period | {} |\n", c.atr_period));
    md.push_str(&format!("| ATR Multiplier | {} |\n", c.atr_multiplier));
    md.push_str(&format!("| Max Bars | {} |\n", c.max_bars));
    md.push_str(&format!("| Exit Mode | {} |\n", c.exit_mode));
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Final Equity | ${:.2} |\n", m.final_equity));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| CAGR | {:.2}% |\n", m.cagr * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Avg Bars Held | {:.1} |\n", m.avg_bars_held));
    md.push_str(&format!("| Max Consecutive Losses | {} |\n", m.max_consecutive_losses));
    md.push_str(&format!("| Peak Open Positions | {} |\n", m.peak_open_positions));
    md.push('\n');

    push_counts(&mut md, "Exit Reasons", &m.exit_counts);
    push_counts(&mut md, "Skipped Signals", &m.skip_counts);

    if let Some(costs) = &result.costs {
        md.push_str("## Estimated Costs\n\n");
        md.push_str("| Item | Value |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| Commission | ${:.2} |\n", costs.total_commission));
        md.push_str(&format!("| Slippage | ${:.2} |\n", costs.total_slippage));
        md.push_str(&format!("| Net Profit Before Costs | ${:.2} |\n", costs.gross_profit));
        md.push_str(&format!("| Net Profit After Costs | ${:.2} |\n", costs.net_after_costs));
        md.push('\n');
    }

    md
}

fn push_counts(md: &mut String, title: &str, counts: &std::collections::BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    md.push_str(&format!("## {title}\n\n"));
    md.push_str("| Reason | Count |\n");
    md.push_str("| --- | --- |\n");
    for (reason, count) in counts {
        md.push_str(&format!("| {reason} | {count} |\n"));
    }
    md.push('\n');
}
