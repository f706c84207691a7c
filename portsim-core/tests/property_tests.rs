//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Stop monotonicity — long stops never fall, short stops never rise
//! 2. Capacity — open positions never exceed `max_positions`
//! 3. Uniqueness — at most one open position per symbol at any time
//! 4. Capital conservation — final cash equals starting capital plus realized PnL
//! 5. Determinism — identical inputs produce identical results
//! 6. Replay agrees with the standalone simulator for a lone position

use chrono::NaiveDate;
use portsim_core::data::{BarRow, MarketData};
use portsim_core::domain::{Bar, Direction, SignalFlag, Trade};
use portsim_core::engine::{ExitMode, PortfolioEngine, SimulationConfig};
use portsim_core::exit::{simulate_exit, simulate_path};
use proptest::prelude::*;
use std::collections::BTreeMap;

// ── Strategies (proptest) ────────────────────────────────────────────

/// One day of a symbol: (return, half-range, flag selector, present).
type Step = (f64, f64, u8, bool);

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        (-0.06..0.06_f64, 0.001..0.04_f64, 0u8..8, prop::bool::weighted(0.9)),
        5..40,
    )
}

fn arb_rows() -> impl Strategy<Value = Vec<BarRow>> {
    prop::collection::vec(arb_steps(), 1..5).prop_map(|symbols| {
        let base = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let mut rows = Vec::new();
        for (s, steps) in symbols.iter().enumerate() {
            let mut prev = 50.0 + 10.0 * s as f64;
            for (d, &(ret, range, flag, present)) in steps.iter().enumerate() {
                let close = prev * (1.0 + ret);
                let open = prev;
                prev = close;
                if !present {
                    continue;
                }
                let high = open.max(close) * (1.0 + range);
                let low = open.min(close) * (1.0 - range);
                let signal = match flag {
                    0 => SignalFlag::Long,
                    1 => SignalFlag::Short,
                    _ => SignalFlag::None,
                };
                rows.push(BarRow {
                    symbol: format!("S{s}"),
                    date: base + chrono::Duration::days(d as i64),
                    open,
                    high,
                    low,
                    close,
                    signal,
                    atr: None,
                });
            }
        }
        rows
    })
}

fn arb_config() -> impl Strategy<Value = SimulationConfig> {
    (
        1usize..4,
        0.05..1.0_f64,
        1usize..6,
        0.5..5.0_f64,
        1usize..15,
        any::<bool>(),
    )
        .prop_map(
            |(max_positions, pct, atr_period, multiplier, max_bars, pre_resolved)| {
                SimulationConfig {
                    starting_capital: 100_000.0,
                    max_positions,
                    position_size_pct: pct,
                    atr_period,
                    atr_multiplier: multiplier,
                    max_bars,
                    exit_mode: if pre_resolved {
                        ExitMode::PreResolved
                    } else {
                        ExitMode::Replay
                    },
                }
            },
        )
}

fn build_market(rows: Vec<BarRow>, atr_period: usize) -> MarketData {
    let mut market = MarketData::from_rows(rows).unwrap();
    market.compute_atr(atr_period);
    market
}

fn trades_by_symbol(trades: &[Trade]) -> BTreeMap<&str, Vec<&Trade>> {
    let mut map: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
    for t in trades {
        map.entry(t.symbol.as_str()).or_default().push(t);
    }
    map
}

// ── 1. Stop monotonicity ─────────────────────────────────────────────

proptest! {
    #[test]
    fn stop_path_is_monotone(
        steps in arb_steps(),
        atrs in prop::collection::vec(prop::option::weighted(0.8, 0.01..5.0_f64), 40),
        short in any::<bool>(),
        multiplier in 0.5..6.0_f64,
        max_bars in 1usize..30,
    ) {
        let base = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let mut prev = 100.0;
        let bars: Vec<Bar> = steps
            .iter()
            .enumerate()
            .map(|(d, &(ret, range, _, _))| {
                let close = prev * (1.0 + ret);
                let open = prev;
                prev = close;
                Bar::new(
                    "X",
                    base + chrono::Duration::days(d as i64),
                    open,
                    open.max(close) * (1.0 + range),
                    open.min(close) * (1.0 - range),
                    close,
                )
            })
            .collect();
        let direction = if short { Direction::Short } else { Direction::Long };
        let signal = portsim_core::domain::Signal {
            symbol: "X".into(),
            date: base - chrono::Duration::days(1),
            direction,
            atr: Some(2.0),
            entry_price: 100.0,
            bar_index: 0,
        };
        let params = portsim_core::exit::ExitParams { multiplier, max_bars };
        let path = simulate_path(&signal, &params, bars.iter().zip(atrs.iter().copied())).unwrap();

        for pair in path.stop_path.windows(2) {
            match direction {
                Direction::Long => prop_assert!(pair[1] >= pair[0]),
                Direction::Short => prop_assert!(pair[1] <= pair[0]),
            }
        }
        prop_assert!(path.bars_held <= max_bars);
        prop_assert_eq!(path.stop_path.len(), path.bars_held + 1);
    }
}

// ── 2–5. Engine invariants ───────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn engine_invariants_hold(rows in arb_rows(), config in arb_config()) {
        let market = build_market(rows, config.atr_period);
        let engine = PortfolioEngine::new(config.clone()).unwrap();
        let result = engine.simulate(&market);

        // One equity point per distinct date, never over capacity.
        prop_assert_eq!(result.equity_curve.len(), market.timeline().len());
        for point in &result.equity_curve {
            prop_assert!(point.open_positions <= config.max_positions);
        }
        prop_assert!(result.peak_open_positions <= config.max_positions);

        // Every admitted signal became exactly one trade.
        prop_assert_eq!(result.trades.len(), result.admitted_count);
        prop_assert_eq!(result.admitted_count + result.skipped.len(), result.signal_count);

        // Trades on one symbol never overlap.
        for (_, trades) in trades_by_symbol(&result.trades) {
            let mut sorted = trades.clone();
            sorted.sort_by_key(|t| t.entry_date);
            for pair in sorted.windows(2) {
                prop_assert!(pair[1].entry_date >= pair[0].exit_date);
            }
        }

        // Capital conservation.
        let realized: f64 = result.trades.iter().map(|t| t.net_profit).sum();
        let residual = result.final_cash - (config.starting_capital + realized);
        prop_assert!(residual.abs() < 1e-6, "residual {}", residual);

        // Bars held never exceed the limit.
        for t in &result.trades {
            prop_assert!(t.bars_held <= config.max_bars);
            prop_assert!(t.shares > 0);
        }
    }

    #[test]
    fn engine_is_deterministic(rows in arb_rows(), config in arb_config()) {
        let market = build_market(rows, config.atr_period);
        let engine = PortfolioEngine::new(config).unwrap();
        prop_assert_eq!(engine.simulate(&market), engine.simulate(&market));
    }
}

// ── 6. Replay vs standalone simulator ────────────────────────────────

proptest! {
    #[test]
    fn lone_position_matches_simulator(
        steps in arb_steps(),
        multiplier in 0.5..5.0_f64,
        max_bars in 1usize..20,
        short in any::<bool>(),
    ) {
        let base = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let mut prev = 80.0;
        let rows: Vec<BarRow> = steps
            .iter()
            .enumerate()
            .map(|(d, &(ret, range, _, _))| {
                let close = prev * (1.0 + ret);
                let open = prev;
                prev = close;
                let signal = match (d, short) {
                    (0, false) => SignalFlag::Long,
                    (0, true) => SignalFlag::Short,
                    _ => SignalFlag::None,
                };
                BarRow {
                    symbol: "ONE".into(),
                    date: base + chrono::Duration::days(d as i64),
                    open,
                    high: open.max(close) * (1.0 + range),
                    low: open.min(close) * (1.0 - range),
                    close,
                    signal,
                    atr: Some(1.0 + range * 10.0),
                }
            })
            .collect();
        let market = MarketData::from_rows(rows).unwrap();
        let config = SimulationConfig {
            starting_capital: 100_000.0,
            atr_multiplier: multiplier,
            max_bars,
            ..SimulationConfig::default()
        };
        let engine = PortfolioEngine::new(config.clone()).unwrap();
        let result = engine.simulate(&market);

        let series = market.get("ONE").unwrap();
        let signal = &series.signals()[0];
        let sim = simulate_exit(
            signal,
            &config.exit_params(),
            config.starting_capital * config.position_size_pct,
            series.forward(signal.bar_index),
        )
        .unwrap();

        prop_assert_eq!(result.trades.len(), 1);
        prop_assert_eq!(&result.trades[0], &sim.trade);
    }
}
