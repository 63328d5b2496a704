//! TradeLab Runner — backtest orchestration and run artifacts.
//!
//! This crate builds on `tradelab-core` to provide:
//! - A single-backtest runner: cache-backed data loading, component
//!   construction from the session config, bar-level and trade-level
//!   metrics folded into one `RunRecord`
//! - The trade blotter, an execution-ordered CSV with a replayed
//!   account-balance column
//! - The run artifact set (`manifest.json`, `equity.csv`, `blotter.csv`,
//!   `report.json`) under a per-run directory named by the run id,
//!   schema-versioned for forward compatibility

pub mod artifacts;
pub mod blotter;
pub mod runner;

pub use artifacts::{
    equity_csv, export_manifest, import_manifest, ArtifactManager, ArtifactPaths, RunManifest,
    RunReport,
};
pub use blotter::{blotter_csv, BLOTTER_COLUMNS};
pub use runner::{
    run_backtest_from_bars, run_single_backtest, RunError, RunRecord, SCHEMA_VERSION,
};
