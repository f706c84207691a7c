//! Pre-resolution of candidate trades.
//!
//! Runs the exit simulator for every signal of one symbol ahead of the
//! portfolio loop. A signal dated before the previous candidate's exit is
//! marked `DUPLICATE_SYMBOL`, since that candidate would still be holding
//! the symbol. Symbols are independent, so callers may resolve them in
//! parallel.

use crate::data::{MarketData, SymbolSeries};
use crate::domain::{Signal, SkipReason};
use crate::exit::{simulate_path, ExitParams, ExitPath};
use chrono::NaiveDate;

/// A signal together with its predetermined exit, or the reason it cannot
/// become a position regardless of portfolio state.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCandidate {
    pub signal: Signal,
    pub exit: Result<ExitPath, SkipReason>,
}

/// Resolve every signal of `series` in date order.
pub fn resolve_symbol_candidates(
    series: &SymbolSeries,
    params: &ExitParams,
) -> Vec<ResolvedCandidate> {
    let mut busy_until: Option<NaiveDate> = None;
    series
        .signals()
        .into_iter()
        .map(|signal| {
            if busy_until.is_some_and(|until| signal.date < until) {
                return ResolvedCandidate {
                    signal,
                    exit: Err(SkipReason::DuplicateSymbol),
                };
            }
            let exit = simulate_path(&signal, params, series.forward(signal.bar_index));
            if let Ok(path) = &exit {
                busy_until = Some(path.exit_date);
            }
            ResolvedCandidate { signal, exit }
        })
        .collect()
}

/// Resolve all symbols sequentially and return candidates in stream order.
pub fn resolve_candidates(market: &MarketData, params: &ExitParams) -> Vec<ResolvedCandidate> {
    let mut candidates: Vec<ResolvedCandidate> = market
        .series
        .values()
        .flat_map(|s| resolve_symbol_candidates(s, params))
        .collect();
    sort_candidates(&mut candidates);
    candidates
}

/// Order candidates the way the engine consumes signals.
pub fn sort_candidates(candidates: &mut [ResolvedCandidate]) {
    candidates.sort_by(|a, b| Signal::stream_order(&a.signal, &b.signal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BarRow;
    use crate::domain::{ExitReason, SignalFlag};

    fn row(day: u32, low: f64, close: f64, signal: SignalFlag) -> BarRow {
        BarRow {
            symbol: "AAA".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            open: close,
            high: close + 1.0,
            low,
            close,
            signal,
            atr: Some(1.0),
        }
    }

    const PARAMS: ExitParams = ExitParams {
        multiplier: 2.0,
        max_bars: 3,
    };

    #[test]
    fn overlapping_signal_marked_duplicate() {
        let data = MarketData::from_rows(vec![
            row(1, 99.0, 100.0, SignalFlag::Long),
            row(2, 99.0, 100.0, SignalFlag::Long),
            row(3, 99.0, 100.0, SignalFlag::None),
            row(4, 99.0, 100.0, SignalFlag::Long),
            row(5, 99.0, 100.0, SignalFlag::None),
        ])
        .unwrap();
        let candidates = resolve_symbol_candidates(data.get("AAA").unwrap(), &PARAMS);
        assert_eq!(candidates.len(), 3);

        let first = candidates[0].exit.as_ref().unwrap();
        assert_eq!(first.reason, ExitReason::Time);
        assert_eq!(first.exit_date, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());

        assert_eq!(candidates[1].exit, Err(SkipReason::DuplicateSymbol));

        // Signal on the first candidate's exit date is allowed.
        let third = candidates[2].exit.as_ref().unwrap();
        assert_eq!(third.reason, ExitReason::DataEnd);
        assert_eq!(third.bars_held, 1);
    }

    #[test]
    fn invalid_atr_does_not_block_later_signals() {
        let mut rows = vec![
            row(1, 99.0, 100.0, SignalFlag::Long),
            row(2, 99.0, 100.0, SignalFlag::Long),
            row(3, 99.0, 100.0, SignalFlag::None),
        ];
        rows[0].atr = Some(0.0);
        let data = MarketData::from_rows(rows).unwrap();
        let candidates = resolve_symbol_candidates(data.get("AAA").unwrap(), &PARAMS);
        assert_eq!(candidates[0].exit, Err(SkipReason::InvalidAtr));
        assert!(candidates[1].exit.is_ok());
    }
}
