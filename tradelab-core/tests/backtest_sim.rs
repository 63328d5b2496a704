//! Integration tests for the backtest loop.
//!
//! Tests:
//! 1. Null generator: flat curve, zero metrics, no trades
//! 2. Round trip accounting: fills, fees, and balance line up
//! 3. Determinism: same seed reproduces slipped runs exactly
//! 4. Risk gate: three straight losses halt further entries

use tradelab_core::config::SessionConfig;
use tradelab_core::domain::{Bar, OrderSide, Position, TradeKind};
use tradelab_core::risk::RiskGate;
use tradelab_core::signal::{EntryReason, ExitReason, NullSignal, Signal, SignalGenerator};
use tradelab_core::sim::Simulator;

/// Helper: bars from close prices, one-minute spacing, high/low one
/// point beyond the open/close range.
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

/// Helper: config with deterministic fills and simple fees.
fn base_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.paper.slippage_ticks = 0;
    config.fees.maker_bps = 10;
    config.fees.taker_bps = 10;
    config
}

fn gate_from(config: &SessionConfig) -> RiskGate {
    RiskGate::from_config(&config.risk)
}

/// Enters at one window length, exits at another, otherwise idle.
struct CycleTrader {
    enter_at: usize,
    entry_price: f64,
    exit_at: usize,
}

impl SignalGenerator for CycleTrader {
    fn name(&self) -> &str {
        "cycle_trader"
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn generate(&self, window: &[Bar], position: Option<&Position>) -> Option<Signal> {
        if position.is_some() {
            return (window.len() == self.exit_at).then_some(Signal::Exit {
                reason: ExitReason::TakeProfit,
            });
        }
        (window.len() == self.enter_at).then_some(Signal::Entry {
            side: OrderSide::Buy,
            price: self.entry_price,
            reason: EntryReason::PullbackEntry,
        })
    }
}

/// Enters whenever flat, exits on the very next bar. Against a falling
/// tape this manufactures a losing streak.
struct Flipper;

impl SignalGenerator for Flipper {
    fn name(&self) -> &str {
        "flipper"
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn generate(&self, window: &[Bar], position: Option<&Position>) -> Option<Signal> {
        match position {
            Some(_) => Some(Signal::Exit {
                reason: ExitReason::TrendReversal,
            }),
            None => Some(Signal::Entry {
                side: OrderSide::Buy,
                price: window[window.len() - 1].close,
                reason: EntryReason::PullbackEntry,
            }),
        }
    }
}

// ──────────────────────────────────────────────
// Null generator
// ──────────────────────────────────────────────

#[test]
fn null_generator_never_touches_the_account() {
    let config = base_config();
    let mut sim = Simulator::from_config(&config);
    let mut gate = gate_from(&config);
    let bars = bars_from_closes(&[100.0, 102.0, 98.0, 101.0, 99.0]);

    let metrics = sim.run_backtest(&bars, &NullSignal, &mut gate).unwrap();

    assert_eq!(sim.equity_curve().len(), bars.len());
    for point in sim.equity_curve() {
        assert_eq!(point.equity, 10_000.0, "flat account must stay at initial");
        assert_eq!(point.balance, 10_000.0);
    }
    assert!(sim.account().trades().is_empty());
    assert_eq!(sim.skip_counters().total(), 0);
    assert_eq!(metrics.total_return, 0.0);
    assert_eq!(metrics.max_drawdown, 0.0);
    assert_eq!(metrics.sharpe_ratio, 0.0);
}

// ──────────────────────────────────────────────
// Round trip accounting
// ──────────────────────────────────────────────

#[test]
fn round_trip_accounting_lines_up() {
    // Buy 10 units at 100 (stop 99 from the swing low, 0.5% of 2000
    // risked), sell at 110. Taker 20 bps both legs: entry fee 2.0,
    // exit fee 2.2, so the account finishes at 2095.8.
    let mut config = base_config();
    config.paper.initial_balance = 2_000.0;
    config.strategy.risk_pct_per_trade = 0.5;
    config.fees.taker_bps = 20;
    let mut sim = Simulator::from_config(&config);
    let mut gate = gate_from(&config);

    let bars = bars_from_closes(&[100.0, 100.0, 100.0, 110.0, 110.0]);
    let trader = CycleTrader {
        enter_at: 3,
        entry_price: 100.0,
        exit_at: 5,
    };

    let metrics = sim.run_backtest(&bars, &trader, &mut gate).unwrap();

    let trades = sim.account().trades();
    assert_eq!(trades.len(), 2);

    let entry = &trades[0];
    assert_eq!(entry.kind, TradeKind::Entry);
    assert_eq!(entry.side, OrderSide::Buy);
    assert_eq!(entry.price, 100.0);
    assert_eq!(entry.size, 10.0);
    assert!((entry.fee - 2.0).abs() < 1e-9);
    assert_eq!(entry.realized_pnl, None);

    let exit = &trades[1];
    assert_eq!(exit.kind, TradeKind::Exit);
    assert_eq!(exit.side, OrderSide::Sell);
    assert_eq!(exit.price, 110.0);
    assert!((exit.fee - 2.2).abs() < 1e-9);
    assert!((exit.realized_pnl.unwrap() - 97.8).abs() < 1e-9);

    assert!((sim.account().balance() - 2_095.8).abs() < 1e-9);
    assert!(sim.account().position("BTC/USD").is_none());

    // Metrics are computed from the same curve the run produced. While
    // the position was open the balance had posted the full notional, so
    // the curve dips to 998 and the drawdown records that dip.
    assert!((metrics.total_return - 95.8 / 2_000.0).abs() < 1e-9);
    assert!((metrics.max_drawdown - 1_002.0 / 2_000.0).abs() < 1e-9);
    assert!(metrics.sharpe_ratio.is_finite());
}

#[test]
fn open_position_is_marked_into_equity() {
    let mut config = base_config();
    config.paper.initial_balance = 2_000.0;
    config.strategy.risk_pct_per_trade = 0.5;
    config.fees.taker_bps = 20;
    let mut sim = Simulator::from_config(&config);
    let mut gate = gate_from(&config);

    let bars = bars_from_closes(&[100.0, 100.0, 100.0, 110.0]);
    let trader = CycleTrader {
        enter_at: 3,
        entry_price: 100.0,
        exit_at: usize::MAX,
    };
    sim.run_backtest(&bars, &trader, &mut gate).unwrap();

    // Entry debits the full cost (1002), and equity adds back only the
    // unrealized move: zero at the fill, +100 after the gap to 110.
    let curve = sim.equity_curve();
    assert_eq!(curve[1].equity, 2_000.0);
    assert!((curve[2].equity - 998.0).abs() < 1e-9);
    assert!((curve[3].equity - 1_098.0).abs() < 1e-9);
    assert!((sim.equity() - 1_098.0).abs() < 1e-9);
    assert!((curve[3].balance - 998.0).abs() < 1e-9, "balance holds until the exit");
}

// ──────────────────────────────────────────────
// Determinism
// ──────────────────────────────────────────────

#[test]
fn same_seed_reproduces_slipped_fills() {
    let mut config = base_config();
    config.paper.initial_balance = 2_000.0;
    config.paper.slippage_ticks = 2;
    config.strategy.risk_pct_per_trade = 0.5;

    let bars = bars_from_closes(&[100.0, 100.0, 100.0, 110.0, 110.0]);
    let trader = CycleTrader {
        enter_at: 3,
        entry_price: 100.0,
        exit_at: 5,
    };

    let mut first = Simulator::from_config(&config);
    let mut gate = gate_from(&config);
    first.run_backtest(&bars, &trader, &mut gate).unwrap();

    let mut second = Simulator::from_config(&config);
    let mut gate = gate_from(&config);
    second.run_backtest(&bars, &trader, &mut gate).unwrap();

    assert_eq!(first.equity_curve(), second.equity_curve());
    assert_eq!(first.account().balance(), second.account().balance());

    let (a, b) = (first.account().trades(), second.account().trades());
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert_eq!(x.price, y.price);
        assert_eq!(x.fee, y.fee);
        assert_eq!(x.realized_pnl, y.realized_pnl);
    }

    // Slippage actually engaged: the entry did not fill exactly at the
    // signal price.
    assert_ne!(a[0].price, 100.0);
}

// ──────────────────────────────────────────────
// Risk gate interplay
// ──────────────────────────────────────────────

#[test]
fn loss_streak_halts_further_entries() {
    let mut config = base_config();
    config.strategy.risk_pct_per_trade = 0.1;
    let mut sim = Simulator::from_config(&config);
    let mut gate = gate_from(&config);

    // Falling by one point per bar: each flip loses roughly eleven
    // dollars. After the third straight loss the gate refuses entries.
    let bars = bars_from_closes(&[100.0, 99.0, 98.0, 97.0, 96.0, 95.0, 94.0, 93.0]);
    sim.run_backtest(&bars, &Flipper, &mut gate).unwrap();

    let trades = sim.account().trades();
    assert_eq!(trades.len(), 6, "three round trips before the halt");
    for exit in trades.iter().filter(|t| t.kind == TradeKind::Exit) {
        assert!(exit.realized_pnl.unwrap() < 0.0);
    }

    assert_eq!(sim.skip_counters().risk_halted, 2);
    assert_eq!(sim.account().position_count(), 0);
    assert!(sim.account().balance() < 10_000.0);
}
