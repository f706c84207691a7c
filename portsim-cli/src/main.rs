//! portsim CLI — run, validate and ATR inspection commands.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML run file, with flag overrides
//! - `validate` — check a run file without loading data
//! - `atr` — print the Wilder ATR series of one symbol

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use portsim_core::ExitMode;
use portsim_runner::{
    atr_series, run_backtest, save_artifacts, BacktestResult, DataFormat, RunConfig,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "portsim",
    about = "portsim — portfolio-constrained ATR trailing-stop backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExitModeArg {
    Replay,
    #[value(name = "pre_resolved")]
    PreResolved,
}

impl From<ExitModeArg> for ExitMode {
    fn from(arg: ExitModeArg) -> Self {
        match arg {
            ExitModeArg::Replay => ExitMode::Replay,
            ExitModeArg::PreResolved => ExitMode::PreResolved,
        }
    }
}

/// Flags that override individual `[simulation]` and path settings.
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Input file, overriding `data.path`.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory, overriding `output.dir`.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    starting_capital: Option<f64>,

    #[arg(long)]
    max_positions: Option<usize>,

    /// Fraction of equity per position (0 < x <= 1).
    #[arg(long)]
    position_size_pct: Option<f64>,

    #[arg(long)]
    atr_period: Option<usize>,

    #[arg(long)]
    atr_multiplier: Option<f64>,

    #[arg(long)]
    max_bars: Option<usize>,

    #[arg(long, value_enum)]
    exit_mode: Option<ExitModeArg>,
}

impl Overrides {
    fn apply(self, config: &mut RunConfig) {
        let sim = &mut config.simulation;
        if let Some(input) = self.input {
            // A new input path re-infers its format from the extension.
            config.data.path = input;
            config.data.format = None;
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if let Some(v) = self.starting_capital {
            sim.starting_capital = v;
        }
        if let Some(v) = self.max_positions {
            sim.max_positions = v;
        }
        if let Some(v) = self.position_size_pct {
            sim.position_size_pct = v;
        }
        if let Some(v) = self.atr_period {
            sim.atr_period = v;
        }
        if let Some(v) = self.atr_multiplier {
            sim.atr_multiplier = v;
        }
        if let Some(v) = self.max_bars {
            sim.max_bars = v;
        }
        if let Some(v) = self.exit_mode {
            sim.exit_mode = v.into();
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML run file.
    Run {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Parse and validate a run file.
    Validate {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the ATR series of one symbol.
    Atr {
        /// Input file (.csv or .parquet).
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        symbol: String,

        #[arg(long, default_value_t = 30)]
        period: usize,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, overrides } => run_cmd(&config, overrides),
        Commands::Validate { config } => validate_cmd(&config),
        Commands::Atr {
            input,
            symbol,
            period,
        } => atr_cmd(&input, &symbol, period),
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    RunConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

fn run_cmd(config_path: &Path, overrides: Overrides) -> Result<()> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);
    config.validate().context("invalid run configuration")?;

    let result = run_backtest(&config)
        .with_context(|| format!("backtest on {} failed", config.data.path.display()))?;

    print_summary(&result);

    let output_dir = &config.output.dir;
    let run_dir = save_artifacts(&result, output_dir)
        .with_context(|| format!("failed to save artifacts under {}", output_dir.display()))?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn validate_cmd(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate().context("invalid run configuration")?;
    let sim = &config.simulation;
    println!("Config OK: {}", config_path.display());
    println!("  data:           {}", config.data.path.display());
    println!("  format:         {}", config.data.resolved_format()?);
    println!("  capital:        {:.2}", sim.starting_capital);
    println!("  max positions:  {}", sim.max_positions);
    println!("  position size:  {:.1}%", sim.position_size_pct * 100.0);
    println!("  ATR:            period {} x {}", sim.atr_period, sim.atr_multiplier);
    println!("  max bars:       {}", sim.max_bars);
    println!("  exit mode:      {}", sim.exit_mode);
    Ok(())
}

fn atr_cmd(input: &Path, symbol: &str, period: usize) -> Result<()> {
    anyhow::ensure!(period >= 1, "--period must be at least 1");
    let format = DataFormat::from_path(input)
        .with_context(|| format!("cannot infer format of {}", input.display()))?;
    let series = atr_series(input, format, symbol, period)?;
    println!("date,atr");
    for (date, atr) in series {
        match atr {
            Some(v) => println!("{date},{v:.6}"),
            None => println!("{date},"),
        }
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let f = &result.fingerprint;
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", f.short_id());
    if let (Some(first), Some(last)) = (f.first_date, f.last_date) {
        println!("Period:         {first} to {last}");
    }
    println!("Symbols:        {} ({} bars)", f.symbols, f.bars);
    println!(
        "Signals:        {} ({} admitted)",
        result.signal_count, result.admitted_count
    );
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Avg Bars Held:  {:.1}", m.avg_bars_held);
    for (reason, count) in &m.exit_counts {
        println!("Exit {reason:<10} {count}");
    }
    for (reason, count) in &m.skip_counts {
        println!("Skip {reason:<10} {count}");
    }
    if let Some(costs) = &result.costs {
        println!();
        println!("--- Estimated Costs ---");
        println!("Total Cost:     {:.2}", costs.total_cost);
        println!("Net After Cost: {:.2}", costs.net_after_costs);
    }
    println!();
}
