//! CSV bar cache, one file per requested slice.
//!
//! Layout: `{cache_dir}/{SYMBOL}_{timeframe}_{start_ms}_{end_ms}.csv`
//! (slashes in the symbol become underscores) with a `.meta.json` sidecar
//! carrying bar count, time bounds, and a blake3 content hash. Writes are
//! atomic: write to .tmp, rename into place.

use super::DataError;
use crate::domain::{Bar, Timeframe};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for a cached slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_ms: i64,
    pub end_ms: i64,
    pub bar_count: usize,
    pub data_hash: String,
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

/// The on-disk bar cache.
pub struct BarCache {
    cache_dir: PathBuf,
}

impl BarCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn slice_stem(symbol: &str, timeframe: Timeframe, start_ms: i64, end_ms: i64) -> String {
        format!(
            "{}_{}_{start_ms}_{end_ms}",
            symbol.replace('/', "_"),
            timeframe.as_str()
        )
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe, start_ms: i64, end_ms: i64) -> PathBuf {
        self.cache_dir
            .join(format!("{}.csv", Self::slice_stem(symbol, timeframe, start_ms, end_ms)))
    }

    fn meta_path(&self, symbol: &str, timeframe: Timeframe, start_ms: i64, end_ms: i64) -> PathBuf {
        self.cache_dir.join(format!(
            "{}.meta.json",
            Self::slice_stem(symbol, timeframe, start_ms, end_ms)
        ))
    }

    /// Whether a slice is already cached.
    pub fn contains(&self, symbol: &str, timeframe: Timeframe, start_ms: i64, end_ms: i64) -> bool {
        self.csv_path(symbol, timeframe, start_ms, end_ms).exists()
    }

    /// Write a slice to the cache, replacing any previous copy.
    pub fn write(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
        bars: &[Bar],
    ) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::Cache("no bars to cache".into()));
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::Cache(format!("failed to create cache dir: {e}")))?;

        let path = self.csv_path(symbol, timeframe, start_ms, end_ms);
        let tmp_path = path.with_extension("csv.tmp");

        let mut writer = csv::Writer::from_path(&tmp_path)
            .map_err(|e| DataError::Cache(format!("create {}: {e}", tmp_path.display())))?;
        for bar in bars {
            writer
                .serialize(bar)
                .map_err(|e| DataError::Cache(format!("serialize bar: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| DataError::Cache(format!("flush: {e}")))?;
        drop(writer);

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            timeframe,
            start_ms,
            end_ms,
            bar_count: bars.len(),
            data_hash: hash_bars(bars)?,
            cached_at: chrono::Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Cache(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol, timeframe, start_ms, end_ms), meta_json)
            .map_err(|e| DataError::Cache(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load a cached slice, sorted by timestamp ascending. Verifies the
    /// content hash against the sidecar when one is present.
    pub fn load(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, DataError> {
        let path = self.csv_path(symbol, timeframe, start_ms, end_ms);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::Cache(format!("open {}: {e}", path.display())))?;
        let mut bars = Vec::new();
        for row in reader.deserialize() {
            let bar: Bar = row.map_err(|e| DataError::Validation(format!("corrupt cache row: {e}")))?;
            bars.push(bar);
        }
        if bars.is_empty() {
            return Err(DataError::Validation(format!(
                "empty cache file {}",
                path.display()
            )));
        }
        bars.sort_by_key(|b| b.timestamp);

        if let Some(meta) = self.meta(symbol, timeframe, start_ms, end_ms) {
            if hash_bars(&bars)? != meta.data_hash {
                return Err(DataError::Validation(format!(
                    "cache hash mismatch for {}",
                    path.display()
                )));
            }
        }

        Ok(bars)
    }

    /// Sidecar metadata for a slice, if cached.
    pub fn meta(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol, timeframe, start_ms, end_ms)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Every slice sidecar in the cache directory, sorted by symbol then
    /// start time.
    pub fn entries(&self) -> Vec<CacheMeta> {
        let Ok(dir) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut metas: Vec<CacheMeta> = dir
            .flatten()
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| fs::read_to_string(e.path()).ok())
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect();
        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.start_ms.cmp(&b.start_ms)));
        metas
    }

    /// Delete every cached slice. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize, DataError> {
        let Ok(dir) = fs::read_dir(&self.cache_dir) else {
            return Ok(0);
        };
        let mut removed = 0;
        for entry in dir.flatten() {
            let path = entry.path();
            let ext = path.extension().and_then(|x| x.to_str());
            if matches!(ext, Some("csv") | Some("json") | Some("tmp")) {
                fs::remove_file(&path)
                    .map_err(|e| DataError::Cache(format!("remove {}: {e}", path.display())))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn hash_bars(bars: &[Bar]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(bars)
        .map_err(|e| DataError::Cache(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
