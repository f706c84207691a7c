/// ATR trailing stop with a hard time limit.
///
/// Initial stop sits `multiplier × entry_atr` away from the entry price. On
/// every subsequent bar with a valid ATR a candidate stop is computed from
/// that bar's extreme (long: `low − m·atr`, short: `high + m·atr`) and fed
/// through the ratchet, so the stop never loosens. The bar is then tested
/// against the ratcheted stop; failing that, reaching `max_bars` exits at
/// the bar's close.
use crate::domain::{is_valid_atr, Bar, Direction, ExitReason};
use crate::exit::RatchetState;

/// Price and reason of an exit decided on a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    pub price: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    direction: Direction,
    multiplier: f64,
    max_bars: usize,
    initial: f64,
    ratchet: RatchetState,
    bars_held: usize,
}

impl TrailingStop {
    /// Create a stop for a fresh entry. `entry_atr` must already have passed
    /// [`is_valid_atr`]; callers reject the signal otherwise.
    pub fn new(
        direction: Direction,
        entry_price: f64,
        entry_atr: f64,
        multiplier: f64,
        max_bars: usize,
    ) -> Self {
        let initial = entry_price - direction.sign() * multiplier * entry_atr;
        Self {
            direction,
            multiplier,
            max_bars,
            initial,
            ratchet: RatchetState::with_initial_level(direction, initial),
            bars_held: 0,
        }
    }

    /// Current (ratcheted) stop level.
    pub fn level(&self) -> f64 {
        self.ratchet.level()
    }

    pub fn initial_level(&self) -> f64 {
        self.initial
    }

    pub fn bars_held(&self) -> usize {
        self.bars_held
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Advance by one bar. Returns the exit if this bar closes the trade.
    ///
    /// Once `max_bars` bars have been consumed the stop is spent and further
    /// calls return `None` without changing state.
    pub fn on_bar(&mut self, bar: &Bar, atr: Option<f64>) -> Option<ExitFill> {
        if self.bars_held >= self.max_bars {
            return None;
        }
        self.bars_held += 1;

        if let Some(atr) = atr.filter(|_| is_valid_atr(atr)) {
            let candidate = match self.direction {
                Direction::Long => bar.low - self.multiplier * atr,
                Direction::Short => bar.high + self.multiplier * atr,
            };
            self.ratchet.apply(candidate);
        }

        let stop = self.ratchet.level();
        let stopped = match self.direction {
            Direction::Long => bar.low <= stop,
            Direction::Short => bar.high >= stop,
        };
        if stopped {
            return Some(ExitFill {
                price: stop,
                reason: ExitReason::Stop,
            });
        }

        if self.bars_held == self.max_bars {
            return Some(ExitFill {
                price: bar.close,
                reason: ExitReason::Time,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(
            "TEST",
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close,
            high,
            low,
            close,
        )
    }

    #[test]
    fn initial_stop_long_and_short() {
        let long = TrailingStop::new(Direction::Long, 100.0, 2.0, 5.0, 20);
        assert_eq!(long.level(), 90.0);
        let short = TrailingStop::new(Direction::Short, 100.0, 2.0, 5.0, 20);
        assert_eq!(short.level(), 110.0);
    }

    #[test]
    fn looser_candidate_keeps_stop() {
        // Candidate 95 − 5×1.5 = 87.5 < 90 → unchanged.
        let mut stop = TrailingStop::new(Direction::Long, 100.0, 2.0, 5.0, 20);
        assert_eq!(stop.on_bar(&bar(3, 99.0, 95.0, 97.0), Some(1.5)), None);
        assert_eq!(stop.level(), 90.0);
    }

    #[test]
    fn tighter_candidate_ratchets_up() {
        // Candidate 110 − 5×1.8 = 101 > 90 → stop moves to 101.
        let mut stop = TrailingStop::new(Direction::Long, 100.0, 2.0, 5.0, 20);
        stop.on_bar(&bar(3, 99.0, 95.0, 97.0), Some(1.5));
        assert_eq!(stop.on_bar(&bar(4, 115.0, 110.0, 112.0), Some(1.8)), None);
        assert!((stop.level() - 101.0).abs() < 1e-9);
        assert_eq!(stop.initial_level(), 90.0);
    }

    #[test]
    fn invalid_bar_atr_skips_ratchet_but_still_checks_stop() {
        let mut stop = TrailingStop::new(Direction::Long, 100.0, 2.0, 5.0, 20);
        let fill = stop.on_bar(&bar(3, 95.0, 89.0, 91.0), None).unwrap();
        assert_eq!(fill.reason, ExitReason::Stop);
        assert_eq!(fill.price, 90.0);
        assert_eq!(stop.bars_held(), 1);
    }

    #[test]
    fn short_stop_out_when_high_touches() {
        let mut stop = TrailingStop::new(Direction::Short, 100.0, 2.0, 5.0, 20);
        let fill = stop.on_bar(&bar(3, 110.0, 99.0, 105.0), Some(2.0)).unwrap();
        assert_eq!(fill.reason, ExitReason::Stop);
        assert_eq!(fill.price, 110.0);
    }

    #[test]
    fn short_stop_ratchets_down() {
        let mut stop = TrailingStop::new(Direction::Short, 100.0, 2.0, 5.0, 20);
        // Candidate 92 + 5×1 = 97 < 110 → stop moves to 97.
        assert_eq!(stop.on_bar(&bar(3, 92.0, 88.0, 90.0), Some(1.0)), None);
        assert_eq!(stop.level(), 97.0);
        // Candidate 96 + 5×2.6 = 109 > 97 → unchanged.
        assert_eq!(stop.on_bar(&bar(4, 96.0, 94.0, 95.0), Some(2.6)), None);
        assert_eq!(stop.level(), 97.0);
    }

    #[test]
    fn time_exit_at_max_bars_close() {
        let mut stop = TrailingStop::new(Direction::Long, 100.0, 2.0, 5.0, 2);
        assert_eq!(stop.on_bar(&bar(3, 101.0, 99.0, 100.5), Some(2.0)), None);
        let fill = stop.on_bar(&bar(4, 103.0, 100.0, 102.0), Some(2.0)).unwrap();
        assert_eq!(fill.reason, ExitReason::Time);
        assert_eq!(fill.price, 102.0);
        assert_eq!(stop.bars_held(), 2);

        // Spent: further bars change nothing.
        assert_eq!(stop.on_bar(&bar(5, 103.0, 50.0, 60.0), Some(2.0)), None);
        assert_eq!(stop.bars_held(), 2);
    }

    #[test]
    fn stop_takes_precedence_over_time_on_final_bar() {
        let mut stop = TrailingStop::new(Direction::Long, 100.0, 2.0, 5.0, 1);
        let fill = stop.on_bar(&bar(3, 100.0, 85.0, 88.0), Some(2.0)).unwrap();
        assert_eq!(fill.reason, ExitReason::Stop);
        assert_eq!(fill.price, 90.0);
    }
}
