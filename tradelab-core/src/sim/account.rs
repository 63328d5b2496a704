//! Account state: balance, open positions, trade history.

use crate::domain::{Position, Symbol, Trade};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One equity snapshot, appended after every processed bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub equity: f64,
    pub balance: f64,
}

/// Mutable account state owned by the simulator (one logical writer).
///
/// Balance only moves through `debit`/`credit`; affordability is checked
/// by the caller before a fill commits, so balance never goes negative.
#[derive(Debug, Clone)]
pub struct AccountState {
    initial_balance: f64,
    balance: f64,
    positions: HashMap<Symbol, Position>,
    trades: Vec<Trade>,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            positions: HashMap::new(),
            trades: Vec::new(),
        }
    }

    /// Restore the initial state: full balance, no positions, no history.
    pub fn reset(&mut self) {
        self.balance = self.initial_balance;
        self.positions.clear();
        self.trades.clear();
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn debit(&mut self, amount: f64) {
        self.balance -= amount;
    }

    pub fn credit(&mut self, amount: f64) {
        self.balance += amount;
    }

    /// Equity = balance + unrealized P&L of open positions, marked at
    /// `last_price`. Before any price is known positions mark at their
    /// entry, contributing zero.
    pub fn equity(&self, last_price: Option<f64>) -> f64 {
        let unrealized: f64 = self
            .positions
            .values()
            .map(|pos| pos.unrealized_pnl(last_price.unwrap_or(pos.entry_price)))
            .sum();
        self.balance + unrealized
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.get_mut(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn open_position(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn close_position(&mut self, symbol: &str) -> Option<Position> {
        self.positions.remove(symbol)
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderSide, TradeKind};

    fn long(entry: f64, size: f64) -> Position {
        Position {
            symbol: "BTC/USD".into(),
            side: OrderSide::Buy,
            size,
            entry_price: entry,
            stop_loss: entry * 0.98,
            take_profit: entry * 1.03,
            trailing: false,
            entry_ts: 0,
        }
    }

    #[test]
    fn equity_marks_positions_to_market() {
        let mut account = AccountState::new(10_000.0);
        account.debit(1_000.0);
        account.open_position(long(100.0, 10.0));

        // Marked at 110: 9000 cash + 10 * 10 profit... unrealized is
        // (110-100)*10 = 100.
        assert_eq!(account.equity(Some(110.0)), 9_100.0);
        // No price yet: mark at entry, zero unrealized.
        assert_eq!(account.equity(None), 9_000.0);
    }

    #[test]
    fn reset_restores_everything() {
        let mut account = AccountState::new(10_000.0);
        account.debit(5_000.0);
        account.open_position(long(100.0, 10.0));
        account.record_trade(Trade {
            timestamp: 1,
            symbol: "BTC/USD".into(),
            kind: TradeKind::Entry,
            order_id: None,
            side: OrderSide::Buy,
            price: 100.0,
            size: 10.0,
            fee: 2.6,
            realized_pnl: None,
        });

        account.reset();
        assert_eq!(account.balance(), 10_000.0);
        assert_eq!(account.position_count(), 0);
        assert!(account.trades().is_empty());
    }

    #[test]
    fn close_position_removes_it() {
        let mut account = AccountState::new(10_000.0);
        account.open_position(long(100.0, 1.0));
        assert!(account.close_position("BTC/USD").is_some());
        assert!(account.close_position("BTC/USD").is_none());
        assert_eq!(account.position_count(), 0);
    }
}
