//! Indicator computation.
//!
//! ATR is computed once per symbol before the simulation loop and stored
//! alongside the bars; an ATR column supplied with the input overrides it.

pub mod atr;

pub use atr::{true_range, wilder_smooth, Atr};

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
