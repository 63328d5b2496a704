//! Signal generation — turns a bar window plus the open position into
//! directional intent.
//!
//! Signals are ephemeral: produced fresh each cycle, applied or dropped,
//! never persisted. A generator never sees account balance or order state,
//! only the market window and the position it may be asked to exit.

pub mod ema_pullback;

pub use ema_pullback::EmaPullback;

use crate::domain::{Bar, OrderSide, Position};
use serde::{Deserialize, Serialize};

/// Why an entry fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    PullbackEntry,
}

/// Why an exit fired. Ordered by evaluation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrendReversal,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::TrendReversal => "trend_reversal",
        }
    }
}

/// A trading signal for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Signal {
    Entry {
        side: OrderSide,
        price: f64,
        reason: EntryReason,
    },
    Exit {
        reason: ExitReason,
    },
}

impl Signal {
    pub fn is_entry(&self) -> bool {
        matches!(self, Self::Entry { .. })
    }
}

/// Trait for signal generators.
///
/// `generate` receives the visible window (oldest first, current bar last)
/// and the currently open position, if any. Insufficient history is a
/// `None`, never an error.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g. "ema_pullback").
    fn name(&self) -> &str;

    /// Number of bars needed before this generator can produce output.
    fn warmup_bars(&self) -> usize;

    /// Evaluate the window. Exits take priority over entries; entries are
    /// only produced when `position` is `None`.
    fn generate(&self, window: &[Bar], position: Option<&Position>) -> Option<Signal>;

    /// Protective levels for an accepted entry: (stop_loss, take_profit).
    ///
    /// Default construction: stop at the lowest low of the last
    /// `min(10, window_len)` bars, target at entry + 1.5x the stop
    /// distance.
    fn protective_levels(&self, window: &[Bar], entry_price: f64) -> (f64, f64) {
        let lookback = window.len().min(10);
        if lookback == 0 {
            return (entry_price, entry_price);
        }
        let stop = window[window.len() - lookback..]
            .iter()
            .map(|b| b.low)
            .fold(f64::INFINITY, f64::min);
        let risk = entry_price - stop;
        (stop, entry_price + 1.5 * risk)
    }

    /// Breakeven ratchet: once price has moved one full risk unit in the
    /// position's favor, move the stop to entry and latch the trailing
    /// flag. Fires at most once per position. Returns true when the stop
    /// moved.
    fn update_trailing_stop(&self, position: &mut Position, current_price: f64) -> bool {
        if position.trailing {
            return false;
        }
        let risk = position.risk_per_unit();
        if risk <= 0.0 {
            return false;
        }
        let triggered = if position.is_long() {
            current_price >= position.entry_price + risk
        } else {
            current_price <= position.entry_price - risk
        };
        if triggered {
            position.stop_loss = position.entry_price;
            position.trailing = true;
        }
        triggered
    }
}

/// Generator that never fires. Useful as a baseline: a backtest driven by
/// it must leave the account exactly at its initial balance.
#[derive(Debug, Clone, Default)]
pub struct NullSignal;

impl SignalGenerator for NullSignal {
    fn name(&self) -> &str {
        "null"
    }

    fn warmup_bars(&self) -> usize {
        0
    }

    fn generate(&self, _window: &[Bar], _position: Option<&Position>) -> Option<Signal> {
        None
    }
}
