//! Criterion benchmarks for simulator hot paths.
//!
//! Benchmarks:
//! 1. Backtest loop (full run over growing bar windows)
//! 2. Indicator kernels (EMA, ATR batch computation)
//! 3. Run metrics (equity curve reduction)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tradelab_core::config::SessionConfig;
use tradelab_core::domain::{Bar, Timeframe};
use tradelab_core::indicators::{atr, ema};
use tradelab_core::risk::RiskGate;
use tradelab_core::signal::{EmaPullback, NullSignal};
use tradelab_core::sim::{RunMetrics, Simulator};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base_ts = 1_700_000_000_000_i64;
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let open = close - 0.3;
            Bar {
                timestamp: base_ts + (i as i64) * 60_000,
                open,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000.0 + (i % 500) as f64,
            }
        })
        .collect()
}

fn bench_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    // Wide volatility ceiling so the pullback strategy actually trades
    // the synthetic sine tape.
    config.strategy.volatility_threshold = 50.0;
    config
}

// ── 1. Backtest Loop ─────────────────────────────────────────────────

fn bench_backtest_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest_loop");
    let config = bench_config();

    for &bar_count in &[240, 1_440] {
        let bars = make_bars(bar_count);
        let generator = EmaPullback::from_config(&config.strategy);

        group.bench_with_input(
            BenchmarkId::new("ema_pullback", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| {
                    let mut sim = Simulator::from_config(&config);
                    let mut gate = RiskGate::from_config(&config.risk);
                    sim.run_backtest(black_box(&bars), &generator, &mut gate)
                });
            },
        );
    }

    // Null generator over a week of minute bars: the loop floor without
    // any indicator work.
    let bars = make_bars(10_080);
    group.bench_function("null_signal_10080_bars", |b| {
        b.iter(|| {
            let mut sim = Simulator::from_config(&config);
            let mut gate = RiskGate::from_config(&config.risk);
            sim.run_backtest(black_box(&bars), &NullSignal, &mut gate)
        });
    });

    group.finish();
}

// ── 2. Indicator Kernels ─────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_kernels");

    for &bar_count in &[1_440, 10_080] {
        let bars = make_bars(bar_count);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        group.bench_with_input(BenchmarkId::new("ema_21", bar_count), &bar_count, |b, _| {
            b.iter(|| ema(black_box(&closes), 21));
        });

        group.bench_with_input(BenchmarkId::new("atr_14", bar_count), &bar_count, |b, _| {
            b.iter(|| atr(black_box(&bars), 14));
        });
    }

    group.finish();
}

// ── 3. Run Metrics ───────────────────────────────────────────────────

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_metrics");

    let curve: Vec<f64> = (0..10_080)
        .map(|i| 10_000.0 + (i as f64 * 0.05).sin() * 500.0 + i as f64 * 0.01)
        .collect();

    group.bench_function("compute_10080_points", |b| {
        b.iter(|| RunMetrics::compute(black_box(&curve), Timeframe::M1));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_backtest_loop,
    bench_indicators,
    bench_metrics,
);
criterion_main!(benches);
