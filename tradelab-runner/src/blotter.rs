//! Trade blotter — the execution-ordered CSV record of every leg.
//!
//! Columns: `timestamp, symbol, side, price, size, order_id, filled,
//! pnl, account_balance`. One row per executed leg, oldest first; the
//! balance column replays the account walk so the last row ends at the
//! run's final balance.

use anyhow::{Context, Result};
use std::collections::HashMap;
use tradelab_core::domain::{Trade, TradeKind};

/// Blotter column set, in wire order.
pub const BLOTTER_COLUMNS: [&str; 9] = [
    "timestamp",
    "symbol",
    "side",
    "price",
    "size",
    "order_id",
    "filled",
    "pnl",
    "account_balance",
];

/// Render a run's trades as blotter CSV.
///
/// `initial_balance` seeds the balance replay. The simulator fills legs
/// whole, so `filled` mirrors `size`; entries carry a zero `pnl`.
pub fn blotter_csv(trades: &[Trade], initial_balance: f64) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(BLOTTER_COLUMNS)?;

    let mut replay = BalanceReplay::new(initial_balance);
    for trade in trades {
        let balance_after = replay.apply(trade);
        wtr.write_record([
            trade.timestamp.to_string(),
            trade.symbol.clone(),
            trade.side.as_str().to_string(),
            format!("{:.6}", trade.price),
            format!("{:.6}", trade.size),
            trade
                .order_id
                .as_ref()
                .map(|id| id.0.clone())
                .unwrap_or_default(),
            format!("{:.6}", trade.size),
            format!("{:.2}", trade.realized_pnl.unwrap_or(0.0)),
            format!("{:.2}", balance_after),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Replays the account balance leg by leg.
///
/// Entries debit `notional + fee`. Exits credit the recorded entry
/// notional plus realized P&L, which matches the simulator's exit
/// credit for long and short legs alike.
struct BalanceReplay {
    balance: f64,
    open_notional: HashMap<String, f64>,
}

impl BalanceReplay {
    fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            open_notional: HashMap::new(),
        }
    }

    fn apply(&mut self, trade: &Trade) -> f64 {
        match trade.kind {
            TradeKind::Entry => {
                self.open_notional
                    .insert(trade.symbol.clone(), trade.notional());
                self.balance -= trade.notional() + trade.fee;
            }
            TradeKind::Exit => {
                // An exit with no recorded entry leg (partial history)
                // falls back to the long-leg identity
                // entry_notional + pnl == exit_notional - fee.
                let entry_notional = self
                    .open_notional
                    .remove(&trade.symbol)
                    .unwrap_or(trade.notional() - trade.fee - trade.realized_pnl.unwrap_or(0.0));
                self.balance += entry_notional + trade.realized_pnl.unwrap_or(0.0);
            }
        }
        self.balance
    }
}
