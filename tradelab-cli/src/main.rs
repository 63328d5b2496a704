//! TradeLab CLI — fetch, run, and cache management commands.
//!
//! Commands:
//! - `fetch` — pull OHLCV bars from Kraken into the CSV cache
//! - `run` — execute a seeded backtest from a TOML session config
//! - `cache status` — report cached slices, bar counts, total size
//! - `cache clean` — remove cached slices (dry run without --confirm)

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tradelab_core::config::SessionConfig;
use tradelab_core::data::{BarCache, CircuitBreaker, KrakenSource};
use tradelab_core::domain::Timeframe;
use tradelab_core::sim::Simulator;
use tradelab_runner::artifacts::ArtifactManager;
use tradelab_runner::runner::{run_single_backtest, RunRecord};

#[derive(Parser)]
#[command(
    name = "tradelab",
    about = "TradeLab CLI — seeded trading simulation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull OHLCV bars from Kraken into the CSV cache.
    Fetch {
        /// Symbols to fetch (e.g., BTC/USD ETH/USD).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Bar timeframe: 1m, 5m, 15m, 1h.
        #[arg(long, default_value = "1m")]
        timeframe: String,

        /// Start date (YYYY-MM-DD). Defaults to 7 days ago.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Execute a seeded backtest from a TOML session config.
    Run {
        /// Path to a TOML session config file.
        #[arg(long)]
        config: PathBuf,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Output directory for the artifact set.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached slices, bar counts, and total size.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Remove every cached slice.
    Clean {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            symbols,
            timeframe,
            start,
            end,
            cache_dir,
        } => run_fetch(symbols, &timeframe, start, end, cache_dir),
        Commands::Run {
            config,
            cache_dir,
            output_dir,
        } => run_backtest_cmd(&config, &cache_dir, &output_dir),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clean { cache_dir, confirm } => run_cache_clean(&cache_dir, confirm),
        },
    }
}

fn run_fetch(
    symbols: Vec<String>,
    timeframe: &str,
    start: Option<String>,
    end: Option<String>,
    cache_dir: PathBuf,
) -> Result<()> {
    let Some(timeframe) = Timeframe::parse(timeframe) else {
        bail!("unknown timeframe '{timeframe}'. Valid: 1m, 5m, 15m, 1h");
    };

    let end_ts = match end.as_deref() {
        Some(s) => parse_date(s)?,
        None => Utc::now(),
    };
    let start_ts = match start.as_deref() {
        Some(s) => parse_date(s)?,
        None => end_ts - chrono::Duration::days(7),
    };
    if start_ts >= end_ts {
        bail!("--start must be before --end");
    }

    let circuit_breaker = Arc::new(CircuitBreaker::default());
    let source = KrakenSource::new(circuit_breaker);
    let cache = BarCache::new(cache_dir);

    let start_ms = start_ts.timestamp_millis();
    let end_ms = end_ts.timestamp_millis();

    let mut errors: Vec<(String, String)> = Vec::new();
    for symbol in &symbols {
        match Simulator::load_historical_data(
            &source, &cache, symbol, timeframe, start_ms, end_ms,
        ) {
            Ok(bars) => println!(
                "{symbol}: {} bars cached ({} to {})",
                bars.len(),
                format_ts(bars.first().map_or(start_ms, |b| b.timestamp)),
                format_ts(bars.last().map_or(end_ms, |b| b.timestamp)),
            ),
            Err(err) => errors.push((symbol.clone(), err.to_string())),
        }
    }

    if !errors.is_empty() {
        for (symbol, err) in &errors {
            eprintln!("Error for {symbol}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_backtest_cmd(config_path: &Path, cache_dir: &Path, output_dir: &Path) -> Result<()> {
    let config = SessionConfig::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let cache = BarCache::new(cache_dir);
    let circuit_breaker = Arc::new(CircuitBreaker::default());
    let source = KrakenSource::new(circuit_breaker);

    let record = run_single_backtest(&config, &cache, &source)?;

    print_summary(&record);

    let paths = ArtifactManager::new(output_dir)?.save_run(&record)?;
    println!("Artifacts saved to: {}", paths.run_dir.display());

    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = BarCache::new(cache_dir);
    let entries = cache.entries();
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!("Cache: {}", cache_dir.display());
    println!("Slices: {}", entries.len());
    println!("Total size: {}", format_size(dir_size(cache_dir)));
    println!();
    println!(
        "{:<10} {:<4} {:<18} {:<18} {:>8}",
        "Symbol", "TF", "From", "To", "Bars"
    );
    println!("{}", "-".repeat(62));
    for meta in &entries {
        println!(
            "{:<10} {:<4} {:<18} {:<18} {:>8}",
            meta.symbol,
            meta.timeframe.as_str(),
            format_ts(meta.start_ms),
            format_ts(meta.end_ms),
            meta.bar_count,
        );
    }

    Ok(())
}

fn run_cache_clean(cache_dir: &Path, confirm: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = BarCache::new(cache_dir);
    let entries = cache.entries();
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!("Found {} cached slice(s):", entries.len());
    for meta in &entries {
        println!(
            "  {} {} {} to {} ({} bars)",
            meta.symbol,
            meta.timeframe.as_str(),
            format_ts(meta.start_ms),
            format_ts(meta.end_ms),
            meta.bar_count,
        );
    }

    if !confirm {
        println!();
        println!("Dry run: pass --confirm to actually delete.");
        return Ok(());
    }

    let removed = cache.clear()?;
    println!("Done. Removed {removed} file(s).");
    Ok(())
}

/// Parse a YYYY-MM-DD date as midnight UTC.
fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
}

fn format_ts(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn dir_size(path: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                size += meta.len();
            }
        }
    }
    size
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(record: &RunRecord) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", record.run_id);
    println!("Symbol:         {} ({})", record.symbol, record.timeframe);
    println!(
        "Period:         {} to {}",
        format_ts(record.start_ms),
        format_ts(record.end_ms)
    );
    println!("Bars:           {}", record.bar_count);
    println!("Seed:           {}", record.seed);
    println!("Trades:         {}", record.report.total_trades);
    println!();
    println!("--- Performance ---");
    println!(
        "Total Return:   {:.2}%",
        record.metrics.total_return * 100.0
    );
    println!(
        "Max Drawdown:   {:.2}%",
        record.metrics.max_drawdown * 100.0
    );
    println!("Sharpe:         {:.3}", record.metrics.sharpe_ratio);
    println!("Win Rate:       {:.1}%", record.report.win_rate * 100.0);
    println!("Avg Win:        {:.2}", record.report.avg_win);
    println!("Avg Loss:       {:.2}", record.report.avg_loss);
    println!("Net P&L:        {:.2}", record.report.net_pnl);
    println!(
        "Final Balance:  {:.2} (from {:.2})",
        record.final_balance, record.initial_balance
    );
    if record.skips.total() > 0 {
        println!();
        println!("--- Skipped Signals ---");
        let skips = &record.skips;
        if skips.position_open > 0 {
            println!("Position open:        {}", skips.position_open);
        }
        if skips.max_positions > 0 {
            println!("Max positions:        {}", skips.max_positions);
        }
        if skips.risk_halted > 0 {
            println!("Risk halted:          {}", skips.risk_halted);
        }
        if skips.zero_size > 0 {
            println!("Zero size:            {}", skips.zero_size);
        }
        if skips.insufficient_balance > 0 {
            println!("Insufficient balance: {}", skips.insufficient_balance);
        }
    }
    println!();
}
