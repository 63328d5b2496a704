//! Circuit breaker guarding the exchange's public REST API.
//!
//! Repeated failures (timeouts, HTTP 5xx, 429) trip the breaker; a 403
//! trips it immediately. While open, every request is refused until the
//! cooldown expires.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests are allowed.
    Closed,
    /// Requests are refused until the cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Trips after `failure_threshold` consecutive failures and refuses
/// requests for `cooldown` afterwards.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: 3,
        }
    }

    /// Check if requests are currently allowed. An expired cooldown
    /// resets the breaker to closed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request, resetting the failure counter.
    pub fn record_success(&self) {
        self.inner.lock().unwrap().consecutive_failures = 0;
    }

    /// Record a failed request. Trips the breaker once the count reaches
    /// the threshold.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Trip immediately (HTTP 403 / address ban).
    pub fn trip(&self) {
        self.inner.lock().unwrap().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    /// Remaining cooldown, zero when closed.
    pub fn remaining_cooldown(&self) -> Duration {
        match self.inner.lock().unwrap().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}

impl Default for CircuitBreaker {
    /// 5-minute cooldown, suited to a public REST endpoint polled on
    /// bar close.
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}
