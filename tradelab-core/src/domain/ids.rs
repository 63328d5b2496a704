use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID assigned by the owning order manager or the venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The position transition a submission intends to cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Open a new position.
    Open,
    /// Close the open position.
    Close,
    /// Place or replace the protective stop for the open position.
    Protect,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Protect => "protect",
        }
    }
}

/// Idempotency key supplied by the caller with every submission.
///
/// Derived from the intended position transition rather than from the
/// signal that requested it: two same-cycle signals demanding the same
/// transition collapse to one key, and a retry after a transport failure
/// reuses it. Deterministic BLAKE3 of the canonical fields, so replays of
/// the same run produce the same keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationKey(pub String);

impl CorrelationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for the transition decided on the bar at `decision_ts`.
    pub fn for_transition(symbol: &str, kind: TransitionKind, decision_ts: i64) -> Self {
        use serde_json::json;

        let canonical = json!({
            "symbol": symbol,
            "transition": kind.as_str(),
            "decision_ts": decision_ts,
        });
        let hash = blake3::hash(canonical.to_string().as_bytes());
        Self(hash.to_hex().to_string())
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs; the full digest stays in the map.
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}
