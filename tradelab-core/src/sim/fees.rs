//! Venue fee schedule.
//!
//! fee = notional * bps / 10_000
//!
//! Simulated fills always charge the taker rate: the simulator fills
//! against the synthetic quote immediately, which is taker behavior.

use crate::config::FeeSection;

#[derive(Debug, Clone, Copy)]
pub struct FeeSchedule {
    maker_bps: u32,
    taker_bps: u32,
}

impl FeeSchedule {
    pub fn new(maker_bps: u32, taker_bps: u32) -> Self {
        assert!(maker_bps <= 100, "maker_bps out of range");
        assert!(taker_bps <= 100, "taker_bps out of range");
        Self {
            maker_bps,
            taker_bps,
        }
    }

    pub fn from_config(fees: &FeeSection) -> Self {
        Self::new(fees.maker_bps, fees.taker_bps)
    }

    pub fn taker_fee(&self, price: f64, size: f64) -> f64 {
        price * size * f64::from(self.taker_bps) / 10_000.0
    }

    pub fn maker_fee(&self, price: f64, size: f64) -> f64 {
        price * size * f64::from(self.maker_bps) / 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taker_fee_known_value() {
        // notional 1000 at 26 bps -> 2.6
        let fees = FeeSchedule::new(16, 26);
        assert!((fees.taker_fee(100.0, 10.0) - 2.6).abs() < 1e-12);
    }

    #[test]
    fn maker_fee_uses_maker_rate() {
        let fees = FeeSchedule::new(16, 26);
        assert!((fees.maker_fee(100.0, 10.0) - 1.6).abs() < 1e-12);
    }

    #[test]
    fn zero_bps_is_free() {
        let fees = FeeSchedule::new(0, 0);
        assert_eq!(fees.taker_fee(100.0, 10.0), 0.0);
    }

    #[test]
    fn fee_scales_with_notional() {
        let fees = FeeSchedule::new(16, 26);
        let one = fees.taker_fee(100.0, 1.0);
        let ten = fees.taker_fee(100.0, 10.0);
        assert!((ten - 10.0 * one).abs() < 1e-12);
    }
}
