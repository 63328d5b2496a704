//! In-process paper venue.
//!
//! Fills come from the same fee and slippage models the simulator replays
//! with, against the latest synthetic quote. Market and limit orders fill
//! whole and immediately; stop orders rest open so the manager's
//! protection state means the same thing it does against a real venue.
//! Fill noise draws from a dedicated sub-seeded RNG, so paper fills are
//! reproducible and independent of the simulator's own draw sequence.

use super::{ExchangeSink, OrderAck, OrderRequest, SinkError};
use crate::config::SessionConfig;
use crate::domain::{OrderId, OrderSide, OrderStatus, OrderType, Ticker};
use crate::rng::RngHierarchy;
use crate::sim::{FeeSchedule, TickSlippage};
use rand::rngs::StdRng;

pub struct PaperVenue {
    fees: FeeSchedule,
    slippage: TickSlippage,
    rng: StdRng,
    ticker: Option<Ticker>,
    balance: f64,
    next_seq: u64,
}

impl PaperVenue {
    pub fn new(initial_balance: f64, fees: FeeSchedule, slippage: TickSlippage, rng: StdRng) -> Self {
        Self {
            fees,
            slippage,
            rng,
            ticker: None,
            balance: initial_balance,
            next_seq: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.paper.initial_balance,
            FeeSchedule::from_config(&config.fees),
            TickSlippage::new(config.paper.slippage_ticks),
            RngHierarchy::new(config.session.seed).rng_for("paper_venue"),
        )
    }

    /// Latest synthetic quote. Market fills cross this.
    pub fn set_ticker(&mut self, ticker: Ticker) {
        self.ticker = Some(ticker);
    }

    fn fill_order(&mut self, request: &OrderRequest) -> Result<OrderAck, SinkError> {
        self.next_seq += 1;
        let id = OrderId(format!("paper-{}", self.next_seq));

        // Stops rest until price reaches them; they consume no RNG draw.
        if request.order_type == OrderType::Stop {
            let level = request
                .price
                .ok_or_else(|| SinkError::Rejected("stop order without a level".into()))?;
            return Ok(OrderAck {
                id,
                status: OrderStatus::Open,
                filled: 0.0,
                remaining: request.amount,
                cost: 0.0,
                fee: 0.0,
                price: Some(level),
            });
        }

        let basis = match request.order_type {
            OrderType::Limit => request
                .price
                .ok_or_else(|| SinkError::Rejected("limit order without a price".into()))?,
            _ => {
                let ticker = self
                    .ticker
                    .ok_or_else(|| SinkError::Rejected("no ticker yet for a market fill".into()))?;
                ticker.market_fill(request.side)
            }
        };
        let fill = self.slippage.apply(basis, &mut self.rng);
        let cost = fill * request.amount;
        let fee = self.fees.taker_fee(fill, request.amount);
        match request.side {
            OrderSide::Buy => self.balance -= cost + fee,
            OrderSide::Sell => self.balance += cost - fee,
        }
        Ok(OrderAck {
            id,
            status: OrderStatus::Closed,
            filled: request.amount,
            remaining: 0.0,
            cost,
            fee,
            price: Some(fill),
        })
    }
}

impl ExchangeSink for PaperVenue {
    fn name(&self) -> &str {
        "paper"
    }

    fn create_order(&mut self, request: &OrderRequest) -> Result<OrderAck, SinkError> {
        self.fill_order(request)
    }

    fn cancel_order(&mut self, _id: &OrderId, _symbol: &str) -> Result<bool, SinkError> {
        // Resting paper stops live only in the manager's table.
        Ok(true)
    }

    fn fetch_balance(&mut self) -> Result<f64, SinkError> {
        Ok(self.balance)
    }

    fn fetch_open_orders(&mut self, _symbol: Option<&str>) -> Result<Vec<OrderAck>, SinkError> {
        Ok(Vec::new())
    }

    fn fetch_order(&mut self, _id: &OrderId, _symbol: &str) -> Result<Option<OrderAck>, SinkError> {
        Ok(None)
    }
}
