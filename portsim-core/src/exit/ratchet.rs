/// Ratchet invariant enforcement
///
/// **Core Rule:** Stops may tighten, never loosen (even if ATR expands).
use crate::domain::Direction;

/// Ratchet state for a trailing stop.
///
/// - Long positions: stop can only rise (tighten)
/// - Short positions: stop can only fall (tighten)
#[derive(Debug, Clone, PartialEq)]
pub struct RatchetState {
    level: f64,
    direction: Direction,
}

impl RatchetState {
    pub fn with_initial_level(direction: Direction, initial_level: f64) -> Self {
        Self {
            level: initial_level,
            direction,
        }
    }

    /// Apply ratchet to a proposed stop level.
    ///
    /// Returns the ratcheted level (can only tighten, never loosen).
    ///
    /// # Example
    /// ```
    /// use portsim_core::domain::Direction;
    /// use portsim_core::exit::RatchetState;
    ///
    /// let mut ratchet = RatchetState::with_initial_level(Direction::Long, 95.0);
    ///
    /// // Tightening: $95 → $100 (allowed)
    /// assert_eq!(ratchet.apply(100.0), 100.0);
    ///
    /// // Loosening: $100 → $90 (blocked, stays at $100)
    /// assert_eq!(ratchet.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        self.level = match self.direction {
            Direction::Long => self.level.max(proposed),
            Direction::Short => self.level.min(proposed),
        };
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratchet_long_tightening_allowed() {
        let mut ratchet = RatchetState::with_initial_level(Direction::Long, 95.0);
        assert_eq!(ratchet.apply(100.0), 100.0);
        assert_eq!(ratchet.level(), 100.0);
    }

    #[test]
    fn test_ratchet_long_loosening_blocked() {
        let mut ratchet = RatchetState::with_initial_level(Direction::Long, 100.0);
        assert_eq!(ratchet.apply(90.0), 100.0);
    }

    #[test]
    fn test_ratchet_short_tightening_allowed() {
        let mut ratchet = RatchetState::with_initial_level(Direction::Short, 105.0);
        assert_eq!(ratchet.apply(100.0), 100.0);
    }

    #[test]
    fn test_ratchet_short_loosening_blocked() {
        let mut ratchet = RatchetState::with_initial_level(Direction::Short, 100.0);
        assert_eq!(ratchet.apply(110.0), 100.0);
    }

    #[test]
    fn test_ratchet_volatility_trap_scenario() {
        // Price rises to $110 but ATR expands from $5 to $10:
        // proposed stop $110 - 2*$10 = $90 is looser than $95.
        let mut ratchet = RatchetState::with_initial_level(Direction::Long, 95.0);
        assert_eq!(ratchet.apply(90.0), 95.0);
    }
}
