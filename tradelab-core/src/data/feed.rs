//! Feed connectivity monitor: reconnect backoff and staleness tracking.
//!
//! A passive state machine the live loop drives. It owns no sockets;
//! callers report connects, disconnects, and data arrivals, and ask what
//! to do next. Backoff is exponential with jitter, capped at 60s, and
//! gives up after 10 attempts. Data older than 30s counts as stale, which
//! the risk gate treats as grounds to halt new entries.

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;

const MAX_RECONNECT_ATTEMPTS: u32 = 10;
const BASE_BACKOFF_SECS: f64 = 1.0;
const MAX_BACKOFF_SECS: f64 = 60.0;
const STALE_THRESHOLD_MS: i64 = 30_000;

/// Connection state of the market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Subscribed,
    BackingOff { until_ms: i64 },
}

/// What the live loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedAction {
    /// Attempt a connection now.
    Connect,
    /// Sleep until the given time, then ask again.
    Wait { until_ms: i64 },
    /// Reconnect attempts exhausted; the feed is down for good.
    Exhausted,
}

/// Reconnect/staleness bookkeeping for one feed.
#[derive(Debug)]
pub struct FeedMonitor {
    state: FeedState,
    reconnect_attempts: u32,
    last_update: HashMap<String, i64>,
    rng: StdRng,
}

impl FeedMonitor {
    pub fn new(rng: StdRng) -> Self {
        Self {
            state: FeedState::Disconnected,
            reconnect_attempts: 0,
            last_update: HashMap::new(),
            rng,
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// A connection attempt is in flight.
    pub fn on_connect_started(&mut self) {
        self.state = FeedState::Connecting;
    }

    /// The feed is up and subscribed; the attempt counter resets.
    pub fn on_subscribed(&mut self) {
        self.state = FeedState::Subscribed;
        self.reconnect_attempts = 0;
    }

    /// The connection dropped. Returns the next action: a backoff wait,
    /// or `Exhausted` once the attempt limit is reached.
    pub fn on_disconnect(&mut self, now_ms: i64) -> FeedAction {
        self.reconnect_attempts += 1;
        if self.reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
            self.state = FeedState::Disconnected;
            return FeedAction::Exhausted;
        }

        let jitter: f64 = self.rng.gen_range(0.0..1.0);
        let delay_secs = (BASE_BACKOFF_SECS * 2f64.powi(self.reconnect_attempts as i32) + jitter)
            .min(MAX_BACKOFF_SECS);
        let until_ms = now_ms + (delay_secs * 1000.0) as i64;
        self.state = FeedState::BackingOff { until_ms };
        FeedAction::Wait { until_ms }
    }

    /// Poll for the next action. `None` while connecting or subscribed.
    pub fn next_action(&self, now_ms: i64) -> Option<FeedAction> {
        match self.state {
            FeedState::Connecting | FeedState::Subscribed => None,
            FeedState::Disconnected => {
                if self.reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
                    Some(FeedAction::Exhausted)
                } else {
                    Some(FeedAction::Connect)
                }
            }
            FeedState::BackingOff { until_ms } => {
                if now_ms >= until_ms {
                    Some(FeedAction::Connect)
                } else {
                    Some(FeedAction::Wait { until_ms })
                }
            }
        }
    }

    /// Record a data arrival for a channel key (e.g. `ticker_BTC/USD`).
    pub fn record_update(&mut self, key: &str, now_ms: i64) {
        self.last_update.insert(key.to_string(), now_ms);
    }

    /// True if any tracked channel has gone quiet past the threshold.
    /// No channels tracked means not stale.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        self.last_update
            .values()
            .any(|&last| now_ms - last > STALE_THRESHOLD_MS)
    }
}
