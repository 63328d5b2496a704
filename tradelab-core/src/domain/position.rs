//! Open position state.

use super::order::OrderSide;
use serde::{Deserialize, Serialize};

/// An open position. At most one exists per symbol; it is created on entry
/// acceptance, mutated only by the trailing-stop rule, and destroyed on
/// exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Set once the breakeven ratchet has fired.
    pub trailing: bool,
    /// Epoch milliseconds of the entry bar.
    pub entry_ts: i64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == OrderSide::Buy
    }

    /// Initial risk per unit, the denominator of R-based targets.
    pub fn risk_per_unit(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    pub fn notional(&self, current_price: f64) -> f64 {
        self.size * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            OrderSide::Buy => (current_price - self.entry_price) * self.size,
            OrderSide::Sell => (self.entry_price - current_price) * self.size,
        }
    }
}
