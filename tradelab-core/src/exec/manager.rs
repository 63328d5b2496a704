//! Idempotent order manager.
//!
//! Sits between the strategy and the venue: every submission carries a
//! caller-supplied correlation key, and a key that was already dispatched
//! is absorbed instead of re-sent. The manager also owns the per-symbol
//! protection state, so the strategy can ask "is there a live stop?"
//! without trusting its own bookkeeping across reconnects.

use super::{ExchangeSink, ExecError, InstrumentRules, OrderAck, OrderRequest, RequestKind};
use crate::config::ExecutionMode;
use crate::domain::{CorrelationKey, Order, OrderId, OrderStatus, OrderType, Position, TransitionKind};
use std::collections::HashMap;

const DEFAULT_TRAIL_PCT: f64 = 0.005;
const DEFAULT_MIN_CHANGE: f64 = 0.01;

/// Outcome of a submission.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Dispatched to the venue (or recorded, in dry-run) as a new order.
    Accepted(Order),
    /// The correlation key was already used; no order was sent. Carries
    /// the id of the original order.
    Duplicate(OrderId),
}

/// Whether a symbol currently has a live protective stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionState {
    Protected { order_id: OrderId },
    Unprotected { since_ms: i64 },
}

/// Tally of what a reconciliation pass found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Local open orders the venue still reports open.
    pub retained: usize,
    /// Fills that happened during the gap, adopted as `Closed`.
    pub adopted_fills: usize,
    /// Orders the venue no longer knows; marked `Canceled`.
    pub dropped: usize,
}

/// Order table, idempotency ledger, and protection state for one session.
///
/// Orders are iterated in submission order everywhere, so replays of the
/// same run cancel and reconcile in the same sequence.
pub struct OrderManager {
    mode: ExecutionMode,
    orders: HashMap<OrderId, Order>,
    /// Ids in the order they were accepted.
    sequence: Vec<OrderId>,
    /// Correlation key -> the order it produced.
    seen: HashMap<CorrelationKey, OrderId>,
    protection: HashMap<String, ProtectionState>,
    needs_reconcile: bool,
    rules: Option<InstrumentRules>,
    trail_pct: f64,
    min_change: f64,
}

impl OrderManager {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            orders: HashMap::new(),
            sequence: Vec::new(),
            seen: HashMap::new(),
            protection: HashMap::new(),
            needs_reconcile: false,
            rules: None,
            trail_pct: DEFAULT_TRAIL_PCT,
            min_change: DEFAULT_MIN_CHANGE,
        }
    }

    /// Quantize and validate every submission against venue instrument
    /// rules before dispatch. Live sessions set this; paper and dry-run
    /// sessions usually skip it.
    pub fn with_rules(mut self, rules: InstrumentRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn needs_reconcile(&self) -> bool {
        self.needs_reconcile
    }

    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    /// All orders in submission order.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.sequence.iter().filter_map(|id| self.orders.get(id))
    }

    /// Open orders in submission order, optionally filtered by symbol.
    pub fn open_orders(&self, symbol: Option<&str>) -> Vec<&Order> {
        self.orders()
            .filter(|o| o.is_open())
            .filter(|o| symbol.map_or(true, |s| o.symbol == s))
            .collect()
    }

    pub fn protection(&self, symbol: &str) -> Option<&ProtectionState> {
        self.protection.get(symbol)
    }

    /// Submit an order. Duplicate correlation keys are absorbed without
    /// touching the sink; entry requests are refused while the manager is
    /// waiting on reconciliation or while the symbol has no live stop.
    pub fn submit(
        &mut self,
        sink: &mut dyn ExchangeSink,
        request: &OrderRequest,
    ) -> Result<SubmitOutcome, ExecError> {
        if let Some(original) = self.seen.get(&request.correlation_key) {
            return Ok(SubmitOutcome::Duplicate(original.clone()));
        }
        if request.kind == RequestKind::Entry {
            if self.needs_reconcile {
                return Err(ExecError::ReconciliationRequired);
            }
            if let Some(ProtectionState::Unprotected { since_ms }) =
                self.protection.get(&request.symbol)
            {
                return Err(ExecError::Unprotected {
                    symbol: request.symbol.clone(),
                    since_ms: *since_ms,
                });
            }
        }

        let request = match &self.rules {
            Some(rules) => rules.prepare(request)?,
            None => request.clone(),
        };

        // The key is recorded only after a successful dispatch, so a
        // failed submission can be retried with the same key.
        let order = match self.mode {
            ExecutionMode::DryRun => Self::dry_run_order(&request),
            ExecutionMode::Simulated | ExecutionMode::Live => {
                let ack = sink.create_order(&request)?;
                Self::order_from_ack(&request, ack)
            }
        };

        self.seen
            .insert(request.correlation_key.clone(), order.id.clone());
        if request.kind == RequestKind::ProtectiveStop && order.is_open() {
            self.protection.insert(
                request.symbol.clone(),
                ProtectionState::Protected {
                    order_id: order.id.clone(),
                },
            );
        }
        self.sequence.push(order.id.clone());
        self.orders.insert(order.id.clone(), order.clone());
        Ok(SubmitOutcome::Accepted(order))
    }

    /// Cancel one order. Unknown or already-terminal ids are a no-op
    /// success; nothing is working, which is what cancel asks for.
    pub fn cancel(
        &mut self,
        sink: &mut dyn ExchangeSink,
        id: &OrderId,
        now_ms: i64,
    ) -> Result<bool, ExecError> {
        let symbol = match self.orders.get(id) {
            Some(order) if order.is_open() => order.symbol.clone(),
            _ => return Ok(true),
        };

        sink.cancel_order(id, &symbol)?;
        if let Some(order) = self.orders.get_mut(id) {
            order.status = OrderStatus::Canceled;
        }
        self.mark_unprotected_if_stop(id, &symbol, now_ms);
        Ok(true)
    }

    /// Cancel every open order, optionally restricted to one symbol.
    /// Returns how many cancels were issued.
    pub fn cancel_all(
        &mut self,
        sink: &mut dyn ExchangeSink,
        symbol: Option<&str>,
        now_ms: i64,
    ) -> Result<usize, ExecError> {
        let targets: Vec<OrderId> = self
            .open_orders(symbol)
            .into_iter()
            .map(|o| o.id.clone())
            .collect();
        for id in &targets {
            self.cancel(sink, id, now_ms)?;
        }
        Ok(targets.len())
    }

    /// Ratchet the protective stop behind a favorable move.
    ///
    /// The candidate trail is the more favorable of the current stop and
    /// `price * (1 -/+ trail_pct)`; the resting order is replaced only when
    /// the improvement exceeds `min_change`, via cancel-then-resubmit.
    /// Between those two calls the symbol is unprotected and entries are
    /// refused; a failed resubmit leaves it that way and returns the sink
    /// error, and the next maintenance call re-arms from the position's
    /// stop. Returns the new stop level when a replacement happened.
    pub fn update_trailing_stop(
        &mut self,
        sink: &mut dyn ExchangeSink,
        position: &Position,
        current_price: f64,
        now_ms: i64,
    ) -> Result<Option<f64>, ExecError> {
        let symbol = position.symbol.clone();
        let (prev_stop, resting) = match self.protection.get(&symbol) {
            Some(ProtectionState::Protected { order_id }) => {
                let order_id = order_id.clone();
                let prev = self
                    .orders
                    .get(&order_id)
                    .and_then(|o| o.price)
                    .unwrap_or(position.stop_loss);
                (prev, Some(order_id))
            }
            Some(ProtectionState::Unprotected { .. }) => (position.stop_loss, None),
            // Symbol never had a managed stop; nothing to maintain.
            None => return Ok(None),
        };

        let candidate = if position.is_long() {
            current_price * (1.0 - self.trail_pct)
        } else {
            current_price * (1.0 + self.trail_pct)
        };
        let new_stop = if position.is_long() {
            prev_stop.max(candidate)
        } else {
            prev_stop.min(candidate)
        };
        if resting.is_some() && (new_stop - prev_stop).abs() <= self.min_change {
            return Ok(None);
        }

        if let Some(order_id) = resting {
            self.cancel(sink, &order_id, now_ms)?;
        }
        let request = OrderRequest {
            symbol: symbol.clone(),
            order_type: OrderType::Stop,
            side: position.side.opposite(),
            amount: position.size,
            price: Some(new_stop),
            correlation_key: CorrelationKey::for_transition(
                &symbol,
                TransitionKind::Protect,
                now_ms,
            ),
            kind: RequestKind::ProtectiveStop,
            decision_ts: now_ms,
        };
        match self.submit(sink, &request)? {
            SubmitOutcome::Accepted(_) => Ok(Some(new_stop)),
            SubmitOutcome::Duplicate(_) => Ok(None),
        }
    }

    /// Flag a connectivity gap. Entry submissions are refused until
    /// [`OrderManager::on_reconnect`] has reconciled against the venue.
    pub fn on_disconnect(&mut self) {
        self.needs_reconcile = true;
    }

    /// Reconcile the local open-order table against the venue's
    /// authoritative list after a gap.
    ///
    /// Orders the venue still reports open are retained with their
    /// filled/remaining adopted. Orders gone from the list are resolved
    /// through a per-order status query: a reported fill is adopted as
    /// `Closed`, anything else is marked `Canceled`. Clears the
    /// reconciliation flag only when the whole pass succeeds.
    pub fn on_reconnect(
        &mut self,
        sink: &mut dyn ExchangeSink,
        now_ms: i64,
    ) -> Result<ReconcileReport, ExecError> {
        let authoritative = sink.fetch_open_orders(None)?;

        let mut report = ReconcileReport::default();
        let local_open: Vec<OrderId> = self
            .open_orders(None)
            .into_iter()
            .map(|o| o.id.clone())
            .collect();

        for id in &local_open {
            if let Some(ack) = authoritative.iter().find(|a| &a.id == id) {
                if let Some(order) = self.orders.get_mut(id) {
                    order.filled = ack.filled;
                    order.remaining = ack.remaining;
                }
                report.retained += 1;
                continue;
            }

            let symbol = match self.orders.get(id) {
                Some(order) => order.symbol.clone(),
                None => continue,
            };
            let resolved = sink.fetch_order(id, &symbol)?;
            if let Some(order) = self.orders.get_mut(id) {
                match resolved {
                    Some(ack) if ack.status == OrderStatus::Closed => {
                        order.status = OrderStatus::Closed;
                        order.filled = ack.filled;
                        order.remaining = ack.remaining;
                        order.cost = ack.cost;
                        order.fee = ack.fee;
                        if ack.price.is_some() {
                            order.price = ack.price;
                        }
                        report.adopted_fills += 1;
                    }
                    _ => {
                        order.status = OrderStatus::Canceled;
                        report.dropped += 1;
                    }
                }
            }
        }

        // A protective stop that resolved terminal leaves its symbol bare.
        let bare: Vec<String> = self
            .protection
            .iter()
            .filter_map(|(symbol, state)| match state {
                ProtectionState::Protected { order_id } => self
                    .orders
                    .get(order_id)
                    .map_or(true, |o| o.status.is_terminal())
                    .then(|| symbol.clone()),
                ProtectionState::Unprotected { .. } => None,
            })
            .collect();
        for symbol in bare {
            self.protection
                .insert(symbol, ProtectionState::Unprotected { since_ms: now_ms });
        }

        self.needs_reconcile = false;
        Ok(report)
    }

    fn mark_unprotected_if_stop(&mut self, id: &OrderId, symbol: &str, now_ms: i64) {
        if let Some(ProtectionState::Protected { order_id }) = self.protection.get(symbol) {
            if order_id == id {
                self.protection.insert(
                    symbol.to_string(),
                    ProtectionState::Unprotected { since_ms: now_ms },
                );
            }
        }
    }

    fn dry_run_order(request: &OrderRequest) -> Order {
        Order {
            id: OrderId(format!("dry-{}", request.correlation_key)),
            correlation_key: request.correlation_key.clone(),
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            side: request.side,
            amount: request.amount,
            price: request.price,
            status: OrderStatus::DryRun,
            filled: 0.0,
            remaining: request.amount,
            cost: 0.0,
            fee: 0.0,
            created_at: request.decision_ts,
        }
    }

    fn order_from_ack(request: &OrderRequest, ack: OrderAck) -> Order {
        Order {
            id: ack.id,
            correlation_key: request.correlation_key.clone(),
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            side: request.side,
            amount: request.amount,
            price: ack.price.or(request.price),
            status: ack.status,
            filled: ack.filled,
            remaining: ack.remaining,
            cost: ack.cost,
            fee: ack.fee,
            created_at: request.decision_ts,
        }
    }
}
