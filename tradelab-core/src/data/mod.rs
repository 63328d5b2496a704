//! Market data: source trait, Kraken REST source, CSV bar cache, and the
//! feed connectivity monitor.
//!
//! The cache layer sits above [`MarketDataSource`] — sources don't know
//! about the cache. Implementations are swappable so tests can feed the
//! simulator synthetic bars without any network.

use crate::domain::{Bar, Timeframe};
use thiserror::Error;

pub mod cache;
pub mod circuit_breaker;
pub mod feed;
pub mod kraken;

pub use cache::{BarCache, CacheMeta};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use feed::{FeedAction, FeedMonitor, FeedState};
pub use kraken::{kraken_pair, KrakenSource};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("feed reconnect attempts exhausted after {attempts} tries")]
    ConnectivityExhausted { attempts: u32 },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no cached bars for '{symbol}' — run `fetch` first")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for OHLCV sources (Kraken REST, synthetic test feeds).
///
/// `since` and bar timestamps are Unix milliseconds. Implementations
/// return bars sorted ascending by timestamp.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch OHLCV bars, optionally starting at `since` (ms) and capped
    /// at `limit` bars.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, DataError>;

    /// Latest traded price for a symbol.
    fn latest_price(&self, symbol: &str) -> Result<f64, DataError>;

    /// Whether the source is currently able to serve requests.
    fn is_available(&self) -> bool {
        true
    }
}
