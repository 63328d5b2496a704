//! Indicator kernels used by signal generation.
//!
//! Pure series-in/series-out functions over a bar window. Outputs are the
//! same length as the input with a NaN warmup prefix before the seed index,
//! so callers can align indicator values with bars positionally.

pub mod atr;
pub mod ema;

pub use atr::{atr, true_range, wilder_smooth};
pub use ema::ema;

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000,
/// one-minute spacing.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_ts = 1_700_000_000_000_i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                timestamp: base_ts + (i as i64) * 60_000,
                open,
                high,
                low,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

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
