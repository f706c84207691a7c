//! Per-symbol bar series and the market-wide view the engine runs over.

use super::source::{BarRow, BarSource, DataError};
use crate::domain::{Bar, Direction, Signal, SignalFlag};
use crate::indicators::Atr;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Warn when more than this fraction of a symbol's bars fail the OHLC sanity check.
const INSANE_BAR_RATE_THRESHOLD: f64 = 0.05;

/// All bars of one symbol in strictly increasing date order, with the ATR
/// series and entry flags aligned index-for-index.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub atr: Vec<Option<f64>>,
    pub flags: Vec<SignalFlag>,
    /// ATR column values from the input, kept when any row supplied one.
    supplied_atr: Option<Vec<Option<f64>>>,
}

impl SymbolSeries {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
            atr: Vec::new(),
            flags: Vec::new(),
            supplied_atr: None,
        }
    }

    /// Append a row, enforcing strictly increasing dates.
    pub fn push(&mut self, row: BarRow) -> Result<(), DataError> {
        if let Some(last) = self.bars.last() {
            if row.date <= last.date {
                return Err(DataError::NonIncreasingDate {
                    symbol: self.symbol.clone(),
                    previous: last.date,
                    date: row.date,
                });
            }
        }

        if row.atr.is_some() && self.supplied_atr.is_none() {
            self.supplied_atr = Some(vec![None; self.bars.len()]);
        }
        if let Some(supplied) = self.supplied_atr.as_mut() {
            supplied.push(row.atr);
        }

        self.bars.push(row.bar());
        self.atr.push(row.atr);
        self.flags.push(row.signal);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn has_supplied_atr(&self) -> bool {
        self.supplied_atr.is_some()
    }

    /// Fill `atr` from the supplied column, or compute Wilder ATR when none
    /// was supplied.
    pub fn compute_atr(&mut self, period: usize) {
        self.atr = match &self.supplied_atr {
            Some(supplied) => supplied.clone(),
            None => Atr::new(period).compute(&self.bars),
        };
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by(|b| b.date.cmp(&date)).ok()
    }

    pub fn bar_at(&self, date: NaiveDate) -> Option<&Bar> {
        self.index_of(date).map(|i| &self.bars[i])
    }

    pub fn atr_at(&self, index: usize) -> Option<f64> {
        self.atr.get(index).copied().flatten()
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn is_last_index(&self, index: usize) -> bool {
        index + 1 == self.bars.len()
    }

    /// Bars strictly after `index`, each paired with its ATR.
    pub fn forward(&self, index: usize) -> impl Iterator<Item = (&Bar, Option<f64>)> + '_ {
        self.bars
            .iter()
            .zip(self.atr.iter().copied())
            .skip(index + 1)
    }

    /// Entry signals of this symbol in date order.
    pub fn signals(&self) -> Vec<Signal> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, flag)| {
                let direction = match flag {
                    SignalFlag::Long => Direction::Long,
                    SignalFlag::Short => Direction::Short,
                    SignalFlag::None => return None,
                };
                let bar = &self.bars[i];
                Some(Signal {
                    symbol: self.symbol.clone(),
                    date: bar.date,
                    direction,
                    atr: self.atr_at(i),
                    entry_price: bar.close,
                    bar_index: i,
                })
            })
            .collect()
    }

    fn insane_bar_count(&self) -> usize {
        self.bars.iter().filter(|b| !b.is_sane()).count()
    }
}

/// Bars for every symbol, keyed in symbol order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketData {
    pub series: BTreeMap<String, SymbolSeries>,
}

impl MarketData {
    pub fn from_rows<I>(rows: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = BarRow>,
    {
        Self::collect(rows.into_iter().map(Ok))
    }

    pub fn from_source(source: &mut dyn BarSource) -> Result<Self, DataError> {
        let description = source.describe();
        let data = Self::collect(source.rows())?;
        debug!(
            source = %description,
            symbols = data.series.len(),
            bars = data.bar_count(),
            "loaded bar source"
        );
        Ok(data)
    }

    fn collect<I>(rows: I) -> Result<Self, DataError>
    where
        I: Iterator<Item = Result<BarRow, DataError>>,
    {
        let mut series: BTreeMap<String, SymbolSeries> = BTreeMap::new();
        for row in rows {
            let row = row?;
            series
                .entry(row.symbol.clone())
                .or_insert_with(|| SymbolSeries::new(row.symbol.clone()))
                .push(row)?;
        }

        let data = Self { series };
        data.warn_on_quality();
        Ok(data)
    }

    fn warn_on_quality(&self) {
        for s in self.series.values() {
            let insane = s.insane_bar_count();
            if insane == 0 {
                continue;
            }
            let rate = insane as f64 / s.len() as f64;
            if rate > INSANE_BAR_RATE_THRESHOLD {
                warn!(
                    symbol = %s.symbol,
                    insane,
                    bars = s.len(),
                    "high rate of bars failing OHLC sanity check"
                );
            } else {
                debug!(symbol = %s.symbol, insane, "bars failing OHLC sanity check");
            }
        }
    }

    /// Compute ATR for every symbol sequentially.
    pub fn compute_atr(&mut self, period: usize) {
        for s in self.series.values_mut() {
            s.compute_atr(period);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn bar_count(&self) -> usize {
        self.series.values().map(SymbolSeries::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Sorted union of every bar date across symbols.
    pub fn timeline(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self
            .series
            .values()
            .flat_map(|s| s.bars.iter().map(|b| b.date))
            .collect();
        dates.into_iter().collect()
    }

    /// Every entry signal in processing order (see [`Signal::stream_order`]).
    pub fn signals(&self) -> Vec<Signal> {
        let mut signals: Vec<Signal> = self.series.values().flat_map(|s| s.signals()).collect();
        signals.sort_by(Signal::stream_order);
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, day: u32, close: f64, signal: SignalFlag, atr: Option<f64>) -> BarRow {
        BarRow {
            symbol: symbol.into(),
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            signal,
            atr,
        }
    }

    #[test]
    fn groups_rows_by_symbol() {
        let data = MarketData::from_rows(vec![
            row("BBB", 1, 10.0, SignalFlag::None, None),
            row("AAA", 1, 20.0, SignalFlag::None, None),
            row("BBB", 2, 11.0, SignalFlag::Long, None),
        ])
        .unwrap();
        assert_eq!(data.symbols().collect::<Vec<_>>(), vec!["AAA", "BBB"]);
        assert_eq!(data.get("BBB").unwrap().len(), 2);
        assert_eq!(data.bar_count(), 3);
    }

    #[test]
    fn rejects_non_increasing_dates() {
        let err = MarketData::from_rows(vec![
            row("AAA", 2, 10.0, SignalFlag::None, None),
            row("AAA", 2, 11.0, SignalFlag::None, None),
        ])
        .unwrap_err();
        assert!(matches!(err, DataError::NonIncreasingDate { .. }));
    }

    #[test]
    fn timeline_is_sorted_union() {
        let data = MarketData::from_rows(vec![
            row("AAA", 1, 10.0, SignalFlag::None, None),
            row("AAA", 3, 10.0, SignalFlag::None, None),
            row("BBB", 2, 10.0, SignalFlag::None, None),
            row("BBB", 3, 10.0, SignalFlag::None, None),
        ])
        .unwrap();
        let days: Vec<u32> = data
            .timeline()
            .iter()
            .map(|d| chrono::Datelike::day(d))
            .collect();
        assert_eq!(days, vec![1, 2, 3]);
    }

    #[test]
    fn supplied_atr_overrides_computed() {
        let mut data = MarketData::from_rows(vec![
            row("AAA", 1, 10.0, SignalFlag::None, None),
            row("AAA", 2, 10.0, SignalFlag::None, Some(0.7)),
            row("BBB", 1, 10.0, SignalFlag::None, None),
            row("BBB", 2, 12.0, SignalFlag::None, None),
        ])
        .unwrap();
        data.compute_atr(1);

        let aaa = data.get("AAA").unwrap();
        assert!(aaa.has_supplied_atr());
        assert_eq!(aaa.atr, vec![None, Some(0.7)]);

        let bbb = data.get("BBB").unwrap();
        assert!(!bbb.has_supplied_atr());
        // TR[0] = 2, TR[1] = max(2, |13-10|, |11-10|) = 3
        assert_eq!(bbb.atr, vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn signals_carry_close_atr_and_index() {
        let mut data = MarketData::from_rows(vec![
            row("AAA", 1, 10.0, SignalFlag::None, Some(0.5)),
            row("AAA", 2, 11.0, SignalFlag::Short, Some(0.6)),
            row("BBB", 2, 20.0, SignalFlag::Long, Some(0.9)),
        ])
        .unwrap();
        data.compute_atr(14);

        let signals = data.signals();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].symbol, "BBB");
        assert_eq!(signals[1].symbol, "AAA");
        assert_eq!(signals[1].direction, Direction::Short);
        assert_eq!(signals[1].entry_price, 11.0);
        assert_eq!(signals[1].atr, Some(0.6));
        assert_eq!(signals[1].bar_index, 1);
    }

    #[test]
    fn forward_skips_entry_bar() {
        let data = MarketData::from_rows(vec![
            row("AAA", 1, 10.0, SignalFlag::None, Some(1.0)),
            row("AAA", 2, 11.0, SignalFlag::None, Some(1.1)),
            row("AAA", 3, 12.0, SignalFlag::None, Some(1.2)),
        ])
        .unwrap();
        let series = data.get("AAA").unwrap();
        let fwd: Vec<(f64, Option<f64>)> = series.forward(0).map(|(b, a)| (b.close, a)).collect();
        assert_eq!(fwd, vec![(11.0, Some(1.1)), (12.0, Some(1.2))]);
        assert_eq!(series.forward(2).count(), 0);
        assert_eq!(series.index_of(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap()), Some(2));
        assert!(series.is_last_index(2));
    }
}
