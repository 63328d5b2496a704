//! Deterministic paper-trading simulator: fill models, account state,
//! bar-granularity metrics, and the replay loop.

pub mod account;
pub mod fees;
pub mod metrics;
pub mod simulator;
pub mod slippage;

pub use account::{AccountState, EquityPoint};
pub use fees::FeeSchedule;
pub use metrics::RunMetrics;
pub use simulator::{SimError, Simulator, SkipCounters, SkipReason};
pub use slippage::TickSlippage;
