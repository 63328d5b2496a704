//! Backtest runner — wires config, data, strategy, risk, and the
//! simulator together and folds the outcome into one result value.
//!
//! Two entry points:
//! - `run_single_backtest()`: resolves the configured window and loads
//!   bars through the cache, then runs. Used by the CLI.
//! - `run_backtest_from_bars()`: takes pre-loaded bars, no I/O. Used by
//!   tests and anything replaying one dataset repeatedly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradelab_core::analytics::PerformanceReport;
use tradelab_core::config::{ConfigError, SessionConfig};
use tradelab_core::data::{BarCache, DataError, MarketDataSource};
use tradelab_core::domain::{Bar, Timeframe, Trade};
use tradelab_core::risk::RiskGate;
use tradelab_core::signal::EmaPullback;
use tradelab_core::sim::{EquityPoint, RunMetrics, SimError, Simulator, SkipCounters};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),
    #[error("backtest_start and backtest_end must be set to run a backtest")]
    MissingWindow,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
///
/// Everything the artifact set is derived from: run identity (id, seed,
/// window, dataset hash), the full config echo, both metric sets, and
/// the raw trade and equity series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// blake3 fingerprint of the session config; names the artifact
    /// directory, so identical configs overwrite rather than pile up.
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub seed: u64,
    /// First and last bar actually replayed, epoch milliseconds.
    pub start_ms: i64,
    pub end_ms: i64,
    pub bar_count: usize,
    /// blake3 over the replayed bars; ties the run to its input data.
    pub dataset_hash: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    /// Bar-granularity metrics, annualized by the session timeframe.
    pub metrics: RunMetrics,
    /// Trade-level analytics (win rate, net P&L, R multiple).
    pub report: PerformanceReport,
    pub skips: SkipCounters,
    pub config: SessionConfig,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Default schema version for deserializing older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a single backtest from a session config, reading bars through
/// the cache and fetching from the source on a miss.
///
/// This is the high-level entry point used by the CLI. For pre-loaded
/// bars use [`run_backtest_from_bars`] instead.
pub fn run_single_backtest(
    config: &SessionConfig,
    cache: &BarCache,
    source: &dyn MarketDataSource,
) -> Result<RunRecord, RunError> {
    config.validate()?;
    let (start_ms, end_ms) = backtest_window(config)?;

    let bars = Simulator::load_historical_data(
        source,
        cache,
        &config.exchange.symbol,
        config.exchange.timeframe,
        start_ms,
        end_ms,
    )?;

    run_backtest_from_bars(config, &bars)
}

/// Run a backtest over pre-loaded bars — no I/O.
///
/// The config's backtest window is ignored here; the bars themselves
/// define the window the record reports.
pub fn run_backtest_from_bars(
    config: &SessionConfig,
    bars: &[Bar],
) -> Result<RunRecord, RunError> {
    let generator = EmaPullback::from_config(&config.strategy);
    let mut gate = RiskGate::from_config(&config.risk);
    let mut sim = Simulator::from_config(config);

    let metrics = sim.run_backtest(bars, &generator, &mut gate)?;

    let equities: Vec<f64> = sim.equity_curve().iter().map(|p| p.equity).collect();
    let report = PerformanceReport::compute(sim.account().trades(), &equities);

    Ok(RunRecord {
        schema_version: SCHEMA_VERSION,
        run_id: config.fingerprint(),
        created_at: Utc::now(),
        symbol: config.exchange.symbol.clone(),
        timeframe: config.exchange.timeframe,
        seed: config.session.seed,
        start_ms: bars.first().map_or(0, |b| b.timestamp),
        end_ms: bars.last().map_or(0, |b| b.timestamp),
        bar_count: bars.len(),
        dataset_hash: dataset_hash(bars),
        initial_balance: sim.account().initial_balance(),
        final_balance: sim.account().balance(),
        metrics,
        report,
        skips: sim.skip_counters(),
        config: config.clone(),
        trades: sim.account().trades().to_vec(),
        equity_curve: sim.equity_curve().to_vec(),
    })
}

/// The configured backtest window in epoch milliseconds.
fn backtest_window(config: &SessionConfig) -> Result<(i64, i64), RunError> {
    match (config.session.backtest_start, config.session.backtest_end) {
        (Some(start), Some(end)) => Ok((start.timestamp_millis(), end.timestamp_millis())),
        _ => Err(RunError::MissingWindow),
    }
}

/// Content hash of a bar series. Two runs over the same window hash
/// identically whether the bars came from cache or from the wire.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
