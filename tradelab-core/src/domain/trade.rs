//! Executed trade legs — the append-only record everything downstream
//! (equity, analytics, blotter) is derived from.

use super::ids::OrderId;
use super::order::OrderSide;
use serde::{Deserialize, Serialize};

/// Which half of a position's life a leg belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Entry,
    Exit,
}

/// One executed fill. Immutable once appended; backtests append in strict
/// chronological order, live appends in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    // ─── Identity ────────────────────────────────────────────
    pub timestamp: i64,
    pub symbol: String,
    pub kind: TradeKind,
    /// Set when the leg went through the order manager; backtest fills
    /// applied directly by the simulator carry `None`.
    pub order_id: Option<OrderId>,

    // ─── Execution ───────────────────────────────────────────
    pub side: OrderSide,
    pub price: f64,
    pub size: f64,
    pub fee: f64,

    // ─── Outcome ─────────────────────────────────────────────
    /// Realized P&L net of the exit fee. Exits only; entries carry `None`.
    pub realized_pnl: Option<f64>,
}

impl Trade {
    /// Absolute notional of this leg, the unit of exposure.
    pub fn notional(&self) -> f64 {
        (self.size * self.price).abs()
    }

    /// True for an exit leg that realized a profit.
    pub fn is_winner(&self) -> bool {
        matches!(self.realized_pnl, Some(pnl) if pnl > 0.0)
    }

    /// True for an exit leg that realized a loss.
    pub fn is_loser(&self) -> bool {
        matches!(self.realized_pnl, Some(pnl) if pnl < 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_exit(pnl: f64) -> Trade {
        Trade {
            timestamp: 1_700_000_060_000,
            symbol: "BTC/USD".into(),
            kind: TradeKind::Exit,
            order_id: None,
            side: OrderSide::Sell,
            price: 110.0,
            size: 1.0,
            fee: 0.11,
            realized_pnl: Some(pnl),
        }
    }

    #[test]
    fn winner_loser_classification() {
        assert!(sample_exit(9.79).is_winner());
        assert!(!sample_exit(9.79).is_loser());
        assert!(sample_exit(-3.0).is_loser());
        assert!(!sample_exit(0.0).is_winner());
        assert!(!sample_exit(0.0).is_loser());
    }

    #[test]
    fn entries_never_classify() {
        let entry = Trade {
            kind: TradeKind::Entry,
            side: OrderSide::Buy,
            price: 100.0,
            realized_pnl: None,
            ..sample_exit(0.0)
        };
        assert!(!entry.is_winner());
        assert!(!entry.is_loser());
    }

    #[test]
    fn notional_is_absolute() {
        assert_eq!(sample_exit(9.79).notional(), 110.0);
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_exit(9.79);
        let json = serde_json::to_string(&trade).unwrap();
        let deser: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade.timestamp, deser.timestamp);
        assert_eq!(trade.realized_pnl, deser.realized_pnl);
        assert_eq!(trade.kind, deser.kind);
    }
}
