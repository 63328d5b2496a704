//! Bar — the fundamental market data unit — and the synthetic ticker
//! derived from it.

use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol over one timeframe interval.
///
/// Timestamps are epoch milliseconds at the interval open. Volume is kept
/// as `f64` because crypto venues report fractional base volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLCV field is non-finite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// Basic OHLCV sanity check: high >= low, body inside the range,
    /// positive prices, non-negative volume.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }

    /// Bar midpoint, used as the synthetic quote center.
    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Best bid/ask snapshot plus last traded price.
///
/// Backtests have no order book, so the quote is synthesized from the bar:
/// the spread is the bar range, quotes sit 10% of the range either side of
/// the midpoint, and `last` is the close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

impl Ticker {
    pub fn from_bar(bar: &Bar) -> Self {
        let mid = bar.mid();
        let spread = bar.high - bar.low;
        Self {
            bid: mid - 0.1 * spread,
            ask: mid + 0.1 * spread,
            last: bar.close,
        }
    }

    /// Price a market order crosses at: buys lift the ask, sells hit the
    /// bid.
    pub fn market_fill(&self, side: super::order::OrderSide) -> f64 {
        match side {
            super::order::OrderSide::Buy => self.ask,
            super::order::OrderSide::Sell => self.bid,
        }
    }
}

/// Supported bar granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
}

impl Timeframe {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::M1),
            "5m" => Some(Self::M5),
            "15m" => Some(Self::M15),
            "1h" => Some(Self::H1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
        }
    }

    /// Interval length in minutes (the unit Kraken's OHLC endpoint takes).
    pub fn minutes(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::H1 => 60,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        i64::from(self.minutes()) * 60_000
    }

    /// Bars per year on a 252-trading-day basis, used to annualize
    /// bar-granularity Sharpe ratios.
    pub fn bars_per_year(&self) -> f64 {
        match self {
            Self::M1 => 252.0 * 24.0 * 60.0,
            Self::M5 => 252.0 * 24.0 * 12.0,
            Self::M15 => 252.0 * 24.0 * 4.0,
            Self::H1 => 252.0 * 24.0,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
