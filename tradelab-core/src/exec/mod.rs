//! Order routing and execution.
//!
//! The [`OrderManager`] owns the order table and the idempotency ledger;
//! venues implement [`ExchangeSink`]. Paper sessions route to the
//! in-process [`PaperVenue`], live sessions to an exchange adapter, and
//! dry runs short-circuit inside the manager without touching a sink.

pub mod instrument;
pub mod manager;
pub mod paper;

pub use instrument::InstrumentRules;
pub use manager::{OrderManager, ProtectionState, ReconcileReport, SubmitOutcome};
pub use paper::PaperVenue;

use crate::domain::{CorrelationKey, OrderId, OrderSide, OrderStatus, OrderType};
use thiserror::Error;

/// Venue-side failures. `Rejected` is a definitive refusal; `Unavailable`
/// is transport trouble worth a retry.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("venue unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by the order manager.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Entry refused between a connectivity gap and the reconciliation
    /// pass that resolves it.
    #[error("open orders not reconciled since reconnect; entry refused")]
    ReconciliationRequired,
    /// Entry refused while the symbol has no live protective stop.
    #[error("{symbol} unprotected since {since_ms}; entry refused")]
    Unprotected { symbol: String, since_ms: i64 },
}

/// Role the order plays in the position lifecycle. Exits and protective
/// stops stay permitted in states where entries are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Entry,
    Exit,
    ProtectiveStop,
}

/// A submission handed to the order manager.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    /// Limit or stop level. `None` for market orders.
    pub price: Option<f64>,
    /// Idempotency key for the position transition this order causes.
    pub correlation_key: CorrelationKey,
    pub kind: RequestKind,
    /// Epoch milliseconds of the decision bar.
    pub decision_ts: i64,
}

/// Venue acknowledgement of a submission or a status query.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub id: OrderId,
    pub status: OrderStatus,
    pub filled: f64,
    pub remaining: f64,
    pub cost: f64,
    pub fee: f64,
    /// Fill price, or the resting level while the order is open.
    pub price: Option<f64>,
}

/// An execution venue.
///
/// Methods take `&mut self` because venues carry session state: the paper
/// venue consumes RNG draws per fill, a live adapter reuses a connection.
pub trait ExchangeSink: Send {
    /// Venue name for reports and error messages.
    fn name(&self) -> &str;

    fn create_order(&mut self, request: &OrderRequest) -> Result<OrderAck, SinkError>;

    /// `Ok(true)` once the order is no longer working at the venue.
    fn cancel_order(&mut self, id: &OrderId, symbol: &str) -> Result<bool, SinkError>;

    fn fetch_balance(&mut self) -> Result<f64, SinkError>;

    /// Authoritative list of orders the venue still considers open.
    fn fetch_open_orders(&mut self, symbol: Option<&str>) -> Result<Vec<OrderAck>, SinkError>;

    /// Status of a single order, `None` when the venue no longer knows
    /// the id.
    fn fetch_order(&mut self, id: &OrderId, symbol: &str) -> Result<Option<OrderAck>, SinkError>;
}
