//! Domain types for TradeLab.

pub mod bar;
pub mod ids;
pub mod order;
pub mod position;
pub mod trade;

pub use bar::{Bar, Ticker, Timeframe};
pub use ids::{CorrelationKey, OrderId, TransitionKind};
pub use order::{Order, OrderSide, OrderStatus, OrderType};
pub use position::Position;
pub use trade::{Trade, TradeKind};

/// Symbol type alias
pub type Symbol = String;
