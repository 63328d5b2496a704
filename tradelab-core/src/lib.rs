//! TradeLab Core — domain types, strategy, simulation, and execution.
//!
//! This crate contains the heart of the trading engine:
//! - Domain types (bars, orders, positions, trades, correlation keys)
//! - Indicator kernels (EMA, ATR)
//! - EMA-pullback signal generation behind the `SignalGenerator` trait,
//!   with swing-low protective levels and a breakeven ratchet
//! - Risk gate with hard breakers, loss-streak counter, and cooldown
//! - Deterministic bar-replay simulator with seeded fill noise
//! - Idempotent order manager above paper / dry-run / live back ends
//! - Market data: Kraken OHLCV source, on-disk bar cache, feed state
//!   machine with jittered backoff
//! - Pure performance analytics
//!
//! Everything is deterministic given a config and a seed: RNG streams are
//! sub-seeded by label, caches are content-hashed, and replaying the same
//! inputs reproduces every fill, skip, and metric bit for bit.

pub mod analytics;
pub mod config;
pub mod data;
pub mod domain;
pub mod exec;
pub mod indicators;
pub mod risk;
pub mod rng;
pub mod signal;
pub mod sim;
