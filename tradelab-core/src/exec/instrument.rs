//! Exchange instrument rules for live routing.
//!
//! Symbols go out in Kraken wire format, prices and amounts are quantized
//! down to the venue grid, and minimums are enforced before an order
//! leaves the process. The signed private-API client lives outside this
//! crate; these rules are the part of the wire contract a strategy has to
//! respect regardless of transport.

use super::{OrderRequest, SinkError};
use crate::data::kraken::kraken_pair;

/// Relative slack, in grid steps, so quantization tolerates binary
/// representation error without crossing a real grid boundary.
const GRID_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentRules {
    /// Price grid, in quote currency units.
    pub price_tick: f64,
    /// Amount grid, in base currency units.
    pub amount_step: f64,
    /// Smallest order the venue accepts, in base currency units.
    pub min_amount: f64,
}

impl InstrumentRules {
    /// Kraken spot defaults for the BTC/USD class of pairs.
    pub fn kraken_default() -> Self {
        Self {
            price_tick: 0.1,
            amount_step: 1e-8,
            min_amount: 1e-4,
        }
    }

    /// Venue wire format for a display symbol.
    pub fn wire_symbol(&self, symbol: &str) -> String {
        kraken_pair(symbol)
    }

    /// Quantize a price down to the tick grid.
    pub fn normalize_price(&self, price: f64) -> f64 {
        quantize_down(price, self.price_tick)
    }

    /// Quantize an amount down to the step grid.
    pub fn normalize_amount(&self, amount: f64) -> f64 {
        quantize_down(amount, self.amount_step)
    }

    /// Check an already-normalized order against venue minimums and grids.
    pub fn validate(&self, amount: f64, price: Option<f64>) -> Result<(), SinkError> {
        if amount < self.min_amount {
            return Err(SinkError::Rejected(format!(
                "amount {amount} below minimum {}",
                self.min_amount
            )));
        }
        if !on_grid(amount, self.amount_step) {
            return Err(SinkError::Rejected(format!(
                "amount {amount} not on step {}",
                self.amount_step
            )));
        }
        if let Some(price) = price {
            if !on_grid(price, self.price_tick) {
                return Err(SinkError::Rejected(format!(
                    "price {price} not on tick {}",
                    self.price_tick
                )));
            }
        }
        Ok(())
    }

    /// Normalize a request and validate the result, ready for dispatch.
    pub fn prepare(&self, request: &OrderRequest) -> Result<OrderRequest, SinkError> {
        let mut prepared = request.clone();
        prepared.amount = self.normalize_amount(prepared.amount);
        prepared.price = prepared.price.map(|p| self.normalize_price(p));
        self.validate(prepared.amount, prepared.price)?;
        Ok(prepared)
    }
}

fn quantize_down(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step * (1.0 + GRID_EPSILON)).floor() * step
}

fn on_grid(value: f64, step: f64) -> bool {
    if step <= 0.0 {
        return true;
    }
    (value - quantize_down(value, step)).abs() < step * 1e-6
}
