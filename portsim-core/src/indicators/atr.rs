//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period) seeded with the
//! mean of the first `period` true ranges. TR[0] is the first bar's
//! high-low range, so the first value lands at index `period - 1`.

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atr {
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Bars before the first value appears.
    pub fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    /// ATR aligned to `bars`. A period of zero yields an all-`None` series.
    pub fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        wilder_smooth(&true_range(bars), self.period)
    }
}

/// True Range series aligned to `bars`.
///
/// TR[0] = high - low (no previous close). Any NaN input makes that bar's
/// TR `None`.
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut tr = Vec::with_capacity(bars.len());
    let Some(first) = bars.first() else {
        return tr;
    };
    let range = first.high - first.low;
    tr.push((!range.is_nan()).then_some(range));

    for pair in bars.windows(2) {
        let (prev, bar) = (&pair[0], &pair[1]);
        let (h, l, pc) = (bar.high, bar.low, prev.close);
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            tr.push(None);
        } else {
            tr.push(Some((h - l).max((h - pc).abs()).max((l - pc).abs())));
        }
    }

    tr
}

/// Wilder smoothing with alpha = 1/period.
///
/// Seeded with the mean of the first `period` consecutive present values.
/// A missing value breaks the chain: output is `None` there and the seed
/// window starts over from the next present value.
pub fn wilder_smooth(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let alpha = 1.0 / period as f64;
    let mut prev: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seed_len = 0usize;

    for (i, value) in values.iter().enumerate() {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            prev = None;
            seed_sum = 0.0;
            seed_len = 0;
            continue;
        };

        let smoothed = match prev {
            Some(p) => alpha * v + (1.0 - alpha) * p,
            None => {
                seed_sum += v;
                seed_len += 1;
                if seed_len < period {
                    continue;
                }
                seed_sum / period as f64
            }
        };
        out[i] = Some(smoothed);
        prev = Some(smoothed);
    }

    out
}
