//! Bar-granularity run metrics — pure functions over the equity curve.
//!
//! The Sharpe ratio annualizes by the timeframe's bars-per-year and uses
//! population standard deviation. Drawdown tracks a running peak and is
//! always reported in [0, 1].

use crate::domain::Timeframe;
use serde::{Deserialize, Serialize};

/// Metrics the simulator reports for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

impl RunMetrics {
    pub fn compute(equity_curve: &[f64], timeframe: Timeframe) -> Self {
        Self {
            total_return: total_return(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            sharpe_ratio: sharpe_ratio(equity_curve, timeframe.bars_per_year()),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    if initial <= 0.0 {
        return 0.0;
    }
    let last = equity_curve[equity_curve.len() - 1];
    (last - initial) / initial
}

/// Maximum drawdown as a positive fraction in [0, 1].
///
/// dd = (peak - equity) / peak against the running peak; the running
/// maximum never decreases as the curve extends.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = ((peak - eq) / peak).min(1.0);
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio from per-bar returns.
///
/// Sharpe = mean(returns) / std(returns) * sqrt(bars_per_year), population
/// standard deviation. 0.0 for constant curves or fewer than 2 points.
pub fn sharpe_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = population_std(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * bars_per_year.sqrt()
}

/// Per-bar fractional returns of the curve.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N, not N-1).
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn total_return_fraction() {
        assert_approx(
            total_return(&[1000.0, 1100.0, 1200.0]),
            0.2,
            DEFAULT_EPSILON,
        );
        assert_eq!(total_return(&[1000.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        // Peak 1200, trough 900: dd = 300/1200 = 0.25.
        let curve = [1000.0, 1200.0, 900.0, 1100.0];
        assert_approx(max_drawdown(&curve), 0.25, DEFAULT_EPSILON);
    }

    #[test]
    fn drawdown_of_monotone_curve_is_zero() {
        assert_eq!(max_drawdown(&[1000.0, 1001.0, 1002.0]), 0.0);
        assert_eq!(max_drawdown(&[1000.0, 1000.0, 1000.0]), 0.0);
    }

    #[test]
    fn drawdown_clamped_to_one() {
        // Equity dropping below zero cannot report more than total loss.
        let curve = [1000.0, -500.0];
        assert_eq!(max_drawdown(&curve), 1.0);
    }

    #[test]
    fn sharpe_zero_for_constant_curve() {
        let curve = [1000.0; 10];
        assert_eq!(sharpe_ratio(&curve, Timeframe::M1.bars_per_year()), 0.0);
    }

    #[test]
    fn sharpe_known_value() {
        // Returns: [0.1, -0.1/1.1...] — simpler: alternating +1%, exactly.
        // Curve with constant +1% bar returns has std 0 -> sharpe 0; use a
        // two-return curve instead: returns [0.02, 0.0].
        // mean = 0.01, population std = 0.01 -> ratio 1.0 * sqrt(bars/yr).
        let curve = [1000.0, 1020.0, 1020.0];
        let expected = Timeframe::H1.bars_per_year().sqrt();
        assert_approx(
            sharpe_ratio(&curve, Timeframe::H1.bars_per_year()),
            expected,
            1e-9,
        );
    }

    #[test]
    fn population_std_divides_by_n() {
        // Values 1, 3: mean 2, variance ((1)^2 + (1)^2)/2 = 1.
        assert_approx(population_std(&[1.0, 3.0]), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn compute_bundles_all_metrics() {
        let curve = [1000.0, 1200.0, 900.0, 1100.0];
        let m = RunMetrics::compute(&curve, Timeframe::M1);
        assert_approx(m.total_return, 0.1, DEFAULT_EPSILON);
        assert_approx(m.max_drawdown, 0.25, DEFAULT_EPSILON);
        assert!(m.sharpe_ratio.is_finite());
    }
}
