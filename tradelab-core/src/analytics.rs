//! Performance analytics over a finished run.
//!
//! Pure functions of the trade record and the equity curve. Nothing here
//! mutates state or reads the clock, so the same report can be computed
//! mid-session or later from persisted artifacts.

use crate::domain::{Trade, TradeKind};
use crate::sim::metrics;
use serde::{Deserialize, Serialize};

/// Annualization factor for the report-level Sharpe ratio. Bar-level
/// metrics annualize by timeframe; the report uses the 252-session
/// convention so numbers compare across timeframes.
const ANNUALIZATION_FACTOR: f64 = 252.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    /// Winners over completed round trips.
    pub win_rate: f64,
    pub avg_win: f64,
    /// Mean realized loss; negative or zero.
    pub avg_loss: f64,
    /// Completed round trips (exit legs).
    pub total_trades: usize,
    /// Realized P&L of exits minus entry-leg fees. Exit fees are already
    /// inside realized P&L, so every fee is counted exactly once.
    pub net_pnl: f64,
    /// `net_pnl` per unit of absolute notional traded, both legs counted.
    pub r_multiple: f64,
    pub total_exposure: f64,
}

impl PerformanceReport {
    /// Compute the report. Empty inputs produce the zero report; every
    /// denominator is guarded, so this never fails.
    pub fn compute(trades: &[Trade], equity_curve: &[f64]) -> Self {
        let closed: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.kind == TradeKind::Exit)
            .collect();
        let wins: Vec<f64> = closed
            .iter()
            .filter_map(|t| t.realized_pnl.filter(|p| *p > 0.0))
            .collect();
        let losses: Vec<f64> = closed
            .iter()
            .filter_map(|t| t.realized_pnl.filter(|p| *p < 0.0))
            .collect();

        let win_rate = if closed.is_empty() {
            0.0
        } else {
            wins.len() as f64 / closed.len() as f64
        };

        let realized: f64 = closed.iter().filter_map(|t| t.realized_pnl).sum();
        let entry_fees: f64 = trades
            .iter()
            .filter(|t| t.kind == TradeKind::Entry)
            .map(|t| t.fee)
            .sum();
        let net_pnl = realized - entry_fees;

        let total_exposure: f64 = trades.iter().map(Trade::notional).sum();
        let r_multiple = if total_exposure > 0.0 {
            net_pnl / total_exposure
        } else {
            0.0
        };

        Self {
            total_return: metrics::total_return(equity_curve),
            max_drawdown: metrics::max_drawdown(equity_curve),
            sharpe_ratio: metrics::sharpe_ratio(equity_curve, ANNUALIZATION_FACTOR),
            win_rate,
            avg_win: metrics::mean_f64(&wins),
            avg_loss: metrics::mean_f64(&losses),
            total_trades: closed.len(),
            net_pnl,
            r_multiple,
            total_exposure,
        }
    }
}
