//! Run artifact set — manifest, equity curve, blotter, report.
//!
//! Each completed run persists under `{output_dir}/{run_id}/`:
//! - `manifest.json` — run identity: id, seed, window, dataset hash,
//!   bar-level metrics, and the full config echo
//! - `equity.csv` — per-bar `timestamp,equity,balance`
//! - `blotter.csv` — the trade blotter (see [`crate::blotter`])
//! - `report.json` — trade-level analytics plus the equity series
//!
//! JSON artifacts carry a `schema_version` field. Unknown versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradelab_core::analytics::PerformanceReport;
use tradelab_core::config::SessionConfig;
use tradelab_core::domain::Timeframe;
use tradelab_core::sim::{EquityPoint, RunMetrics, SkipCounters};

use crate::blotter::blotter_csv;
use crate::runner::{RunRecord, SCHEMA_VERSION};

/// Identity slice of a run, persisted as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub seed: u64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub bar_count: usize,
    pub dataset_hash: String,
    pub metrics: RunMetrics,
    pub skips: SkipCounters,
    pub config: SessionConfig,
}

impl RunManifest {
    pub fn from_record(record: &RunRecord) -> Self {
        Self {
            schema_version: record.schema_version,
            run_id: record.run_id.clone(),
            created_at: record.created_at,
            symbol: record.symbol.clone(),
            timeframe: record.timeframe,
            seed: record.seed,
            start_ms: record.start_ms,
            end_ms: record.end_ms,
            bar_count: record.bar_count,
            dataset_hash: record.dataset_hash.clone(),
            metrics: record.metrics,
            skips: record.skips,
            config: record.config.clone(),
        }
    }
}

/// Analytics slice of a run, persisted as `report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(flatten)]
    pub report: PerformanceReport,
    pub equity_curve: Vec<f64>,
}

impl RunReport {
    pub fn from_record(record: &RunRecord) -> Self {
        Self {
            schema_version: record.schema_version,
            report: record.report,
            equity_curve: record.equity_curve.iter().map(|p| p.equity).collect(),
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a manifest to pretty JSON.
pub fn export_manifest(manifest: &RunManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")
}

/// Deserialize a manifest, rejecting unknown schema versions.
pub fn import_manifest(json: &str) -> Result<RunManifest> {
    let manifest: RunManifest =
        serde_json::from_str(json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

/// Serialize a report to pretty JSON.
pub fn export_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize run report")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_report(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize run report")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Render the equity curve as CSV, one row per bar.
pub fn equity_csv(points: &[EquityPoint]) -> String {
    let mut csv = String::with_capacity(40 * points.len() + 32);
    csv.push_str("timestamp,equity,balance\n");
    for point in points {
        csv.push_str(&format!(
            "{},{:.2},{:.2}\n",
            point.timestamp, point.equity, point.balance
        ));
    }
    csv
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub equity_csv: PathBuf,
    pub blotter_csv: PathBuf,
    pub report_json: PathBuf,
}

/// Writes the artifact set for completed runs.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .context("failed to create artifact output directory")?;
        Ok(Self { output_dir })
    }

    /// Directory a run's artifacts land in. Named by the run id, so a
    /// rerun of an identical config overwrites in place.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.output_dir.join(run_id)
    }

    /// Save the complete artifact set for one run.
    pub fn save_run(&self, record: &RunRecord) -> Result<ArtifactPaths> {
        let run_dir = self.run_dir(&record.run_id);
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;

        let manifest = run_dir.join("manifest.json");
        std::fs::write(&manifest, export_manifest(&RunManifest::from_record(record))?)
            .with_context(|| format!("failed to write {}", manifest.display()))?;

        let equity_path = run_dir.join("equity.csv");
        std::fs::write(&equity_path, equity_csv(&record.equity_curve))
            .with_context(|| format!("failed to write {}", equity_path.display()))?;

        let blotter_path = run_dir.join("blotter.csv");
        std::fs::write(
            &blotter_path,
            blotter_csv(&record.trades, record.initial_balance)?,
        )
        .with_context(|| format!("failed to write {}", blotter_path.display()))?;

        let report_path = run_dir.join("report.json");
        std::fs::write(&report_path, export_report(&RunReport::from_record(record))?)
            .with_context(|| format!("failed to write {}", report_path.display()))?;

        Ok(ArtifactPaths {
            run_dir,
            manifest,
            equity_csv: equity_path,
            blotter_csv: blotter_path,
            report_json: report_path,
        })
    }

    /// Load a saved run's manifest. Rejects unknown schema versions.
    pub fn load_manifest(&self, run_id: &str) -> Result<RunManifest> {
        let path = self.run_dir(run_id).join("manifest.json");
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        import_manifest(&json)
    }

    /// Load a saved run's report. Rejects unknown schema versions.
    pub fn load_report(&self, run_id: &str) -> Result<RunReport> {
        let path = self.run_dir(run_id).join("report.json");
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        import_report(&json)
    }
}
