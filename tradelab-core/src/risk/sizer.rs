//! Risk-budget position sizer.
//!
//! # Formula
//! ```text
//! risk_amount = equity * risk_pct / 100
//! size = risk_amount / |entry - stop|
//! ```
//!
//! # Example
//! - Equity: $1,500, risk 1% per trade ($15)
//! - Entry $100, stop $98 (risk per unit $2)
//! - Size: 15 / 2 = 7.5 units

#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Equity fraction risked per trade. Converted from percent once.
    risk_frac: f64,
}

impl PositionSizer {
    pub fn new(risk_pct_per_trade: f64) -> Self {
        assert!(
            risk_pct_per_trade > 0.0 && risk_pct_per_trade < 100.0,
            "risk_pct_per_trade must be in (0, 100)"
        );
        Self {
            risk_frac: risk_pct_per_trade / 100.0,
        }
    }

    /// Size for an entry at `entry` protected by `stop`. Returns 0.0 when
    /// the inputs cannot support a sized trade (no equity, degenerate stop
    /// distance), never an error.
    pub fn size(&self, equity: f64, entry: f64, stop: f64) -> f64 {
        if equity <= 0.0 {
            return 0.0;
        }
        let risk_per_unit = (entry - stop).abs();
        if !(risk_per_unit > 0.0) {
            return 0.0;
        }
        equity * self.risk_frac / risk_per_unit
    }
}
