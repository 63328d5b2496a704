//! Order record and its one-directional lifecycle.

use super::ids::{CorrelationKey, OrderId};
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of order. Market orders cross the spread, limit orders fill at
/// their price, stop orders are the protective leg resting at a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

/// Order lifecycle states. Transitions are one-directional: `Open` may move
/// to `Closed` or `Canceled`, terminal states never reopen. `DryRun` orders
/// are born terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    DryRun,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// A single order owned by the order manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub correlation_key: CorrelationKey,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    /// Limit/stop level, or the fill price once executed. `None` for a
    /// dry-run market order that never priced.
    pub price: Option<f64>,
    pub status: OrderStatus,
    pub filled: f64,
    pub remaining: f64,
    pub cost: f64,
    pub fee: f64,
    /// Epoch milliseconds at submission.
    pub created_at: i64,
}

impl Order {
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }
}
