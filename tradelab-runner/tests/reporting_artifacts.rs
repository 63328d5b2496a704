//! Integration tests for the artifact set: the on-disk layout, schema
//! gating, byte-level determinism, and the blotter balance replay.

use proptest::prelude::*;
use tradelab_core::config::SessionConfig;
use tradelab_core::domain::{Bar, OrderSide, Trade, TradeKind};
use tradelab_runner::artifacts::ArtifactManager;
use tradelab_runner::blotter::{blotter_csv, BLOTTER_COLUMNS};
use tradelab_runner::runner::{run_backtest_from_bars, RunRecord};

fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let base_ts = 1_700_000_000_000_i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base_ts + (i as i64) * 60_000,
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// A record with one completed round trip in it.
fn traded_record() -> RunRecord {
    let mut config = SessionConfig::default();
    config.session.seed = 11;
    config.strategy.ema_short = 3;
    config.strategy.ema_long = 5;
    config.strategy.pullback_pct = 1.0;
    config.strategy.volatility_threshold = 8.0;
    config.strategy.atr_period = 3;
    config.paper.slippage_ticks = 0;

    let bars = bars_from_closes(&[100.0, 101.0, 102.0, 103.0, 104.0, 100.5, 104.0]);
    run_backtest_from_bars(&config, &bars).unwrap()
}

#[test]
fn save_run_writes_the_full_artifact_set() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ArtifactManager::new(dir.path().join("results")).unwrap();
    let record = traded_record();

    let paths = manager.save_run(&record).unwrap();

    assert_eq!(paths.run_dir, manager.run_dir(&record.run_id));
    assert!(paths.manifest.exists());
    assert!(paths.equity_csv.exists());
    assert!(paths.blotter_csv.exists());
    assert!(paths.report_json.exists());

    let blotter = std::fs::read_to_string(&paths.blotter_csv).unwrap();
    assert_eq!(
        blotter.lines().next().unwrap(),
        BLOTTER_COLUMNS.join(",")
    );
    // Header plus one line per trade.
    assert_eq!(blotter.lines().count(), 1 + record.trades.len());

    let equity = std::fs::read_to_string(&paths.equity_csv).unwrap();
    assert_eq!(equity.lines().next().unwrap(), "timestamp,equity,balance");
    assert_eq!(equity.lines().count(), 1 + record.bar_count);
}

#[test]
fn manifest_and_report_roundtrip_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ArtifactManager::new(dir.path()).unwrap();
    let record = traded_record();
    manager.save_run(&record).unwrap();

    let manifest = manager.load_manifest(&record.run_id).unwrap();
    assert_eq!(manifest.run_id, record.run_id);
    assert_eq!(manifest.symbol, record.symbol);
    assert_eq!(manifest.seed, record.seed);
    assert_eq!(manifest.bar_count, record.bar_count);
    assert_eq!(manifest.dataset_hash, record.dataset_hash);
    assert_eq!(manifest.skips, record.skips);
    assert_eq!(manifest.config.fingerprint(), record.run_id);

    let report = manager.load_report(&record.run_id).unwrap();
    assert_eq!(report.report, record.report);
    assert_eq!(report.equity_curve.len(), record.equity_curve.len());
    assert_eq!(
        report.equity_curve.last().copied().unwrap(),
        record.equity_curve.last().unwrap().equity
    );
}

#[test]
fn stored_manifest_with_newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ArtifactManager::new(dir.path()).unwrap();
    let record = traded_record();
    let paths = manager.save_run(&record).unwrap();

    let json = std::fs::read_to_string(&paths.manifest).unwrap();
    let newer = json.replacen("\"schema_version\": 1", "\"schema_version\": 99", 1);
    assert_ne!(json, newer, "fixture must actually bump the version");
    std::fs::write(&paths.manifest, newer).unwrap();

    let err = manager.load_manifest(&record.run_id).unwrap_err();
    assert!(format!("{err:#}").contains("unsupported schema version 99"));
}

#[test]
fn missing_run_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ArtifactManager::new(dir.path()).unwrap();
    assert!(manager.load_manifest("no-such-run").is_err());
    assert!(manager.load_report("no-such-run").is_err());
}

#[test]
fn identical_runs_produce_identical_artifacts() {
    // created_at lives only in the manifest, so everything else in the
    // artifact set must come out byte-identical for the same config.
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let first_paths = ArtifactManager::new(first_dir.path())
        .unwrap()
        .save_run(&traded_record())
        .unwrap();
    let second_paths = ArtifactManager::new(second_dir.path())
        .unwrap()
        .save_run(&traded_record())
        .unwrap();

    for (a, b) in [
        (&first_paths.equity_csv, &second_paths.equity_csv),
        (&first_paths.blotter_csv, &second_paths.blotter_csv),
        (&first_paths.report_json, &second_paths.report_json),
    ] {
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    let mut first: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&first_paths.manifest).unwrap()).unwrap();
    let mut second: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&second_paths.manifest).unwrap()).unwrap();
    first.as_object_mut().unwrap().remove("created_at");
    second.as_object_mut().unwrap().remove("created_at");
    assert_eq!(first, second);
}

// ── Blotter balance replay ───────────────────────────────────────

const FEE_FRAC: f64 = 0.001;

fn entry_trade(ts: i64, price: f64, size: f64, fee: f64) -> Trade {
    Trade {
        timestamp: ts,
        symbol: "BTC/USD".into(),
        kind: TradeKind::Entry,
        order_id: None,
        side: OrderSide::Buy,
        price,
        size,
        fee,
        realized_pnl: None,
    }
}

fn exit_trade(ts: i64, price: f64, size: f64, fee: f64, pnl: f64) -> Trade {
    Trade {
        timestamp: ts,
        symbol: "BTC/USD".into(),
        kind: TradeKind::Exit,
        order_id: None,
        side: OrderSide::Sell,
        price,
        size,
        fee,
        realized_pnl: Some(pnl),
    }
}

proptest! {
    /// The last column of the last blotter row equals an account walk
    /// replayed over the same trades: entries debit notional plus fee,
    /// exits credit the entry notional plus realized P&L.
    #[test]
    fn balance_column_replays_the_account_walk(
        cycles in proptest::collection::vec(
            (10.0f64..1000.0, -0.3f64..0.3, 0.01f64..10.0),
            1..8,
        )
    ) {
        let initial = 10_000.0;
        let mut expected = initial;
        let mut trades = Vec::new();
        let mut ts = 1_700_000_000_000_i64;

        for &(price, delta, size) in &cycles {
            let notional = (size * price).abs();
            let entry_fee = notional * FEE_FRAC;
            trades.push(entry_trade(ts, price, size, entry_fee));
            expected -= notional + entry_fee;
            ts += 60_000;

            let exit_price = price * (1.0 + delta);
            let exit_fee = (size * exit_price).abs() * FEE_FRAC;
            let pnl = (exit_price - price) * size - exit_fee;
            trades.push(exit_trade(ts, exit_price, size, exit_fee, pnl));
            expected += notional + pnl;
            ts += 60_000;
        }

        let csv = blotter_csv(&trades, initial).unwrap();
        let last_row = csv.lines().last().unwrap();
        let balance_field = last_row.rsplit(',').next().unwrap();
        let expected_str = format!("{expected:.2}");
        prop_assert_eq!(balance_field, expected_str.as_str());
    }
}
