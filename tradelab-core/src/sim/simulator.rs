//! The replay engine: a deterministic, single-writer bar loop.
//!
//! Each bar passes through the same five phases — synthetic ticker,
//! trailing ratchet, signal generation, signal application, equity
//! snapshot — whether driven by `run_backtest` over a historical window
//! or one bar at a time by a live scheduler. All randomness (slippage)
//! comes from one seeded RNG owned by this struct; two runs with the
//! same seed, bars, and config produce identical trades and curves.

use crate::config::SessionConfig;
use crate::data::{BarCache, DataError, MarketDataSource};
use crate::domain::{Bar, OrderSide, Position, Symbol, Ticker, Timeframe, Trade, TradeKind};
use crate::risk::{GateContext, PositionSizer, RiskGate};
use crate::rng::RngHierarchy;
use crate::signal::{Signal, SignalGenerator};
use crate::sim::account::{AccountState, EquityPoint};
use crate::sim::fees::FeeSchedule;
use crate::sim::metrics::RunMetrics;
use crate::sim::slippage::TickSlippage;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no bars available for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Why an entry signal was skipped. Skips are counted, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    PositionOpen,
    MaxPositions,
    RiskHalted,
    ZeroSize,
    InsufficientBalance,
}

/// Per-reason counters for skipped entries over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounters {
    pub position_open: u32,
    pub max_positions: u32,
    pub risk_halted: u32,
    pub zero_size: u32,
    pub insufficient_balance: u32,
}

impl SkipCounters {
    fn bump(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::PositionOpen => self.position_open += 1,
            SkipReason::MaxPositions => self.max_positions += 1,
            SkipReason::RiskHalted => self.risk_halted += 1,
            SkipReason::ZeroSize => self.zero_size += 1,
            SkipReason::InsufficientBalance => self.insufficient_balance += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.position_open
            + self.max_positions
            + self.risk_halted
            + self.zero_size
            + self.insufficient_balance
    }
}

/// Deterministic paper-trading simulator.
pub struct Simulator {
    symbol: Symbol,
    timeframe: Timeframe,
    max_positions: usize,
    account: AccountState,
    sizer: PositionSizer,
    fees: FeeSchedule,
    slippage: TickSlippage,
    seed: u64,
    rng: StdRng,
    ticker: Option<Ticker>,
    equity_curve: Vec<EquityPoint>,
    skips: SkipCounters,
}

impl Simulator {
    pub fn from_config(config: &SessionConfig) -> Self {
        let seed = config.session.seed;
        Self {
            symbol: config.exchange.symbol.clone(),
            timeframe: config.exchange.timeframe,
            max_positions: config.risk.max_positions,
            account: AccountState::new(config.paper.initial_balance),
            sizer: PositionSizer::new(config.strategy.risk_pct_per_trade),
            fees: FeeSchedule::from_config(&config.fees),
            slippage: TickSlippage::new(config.paper.slippage_ticks),
            seed,
            rng: RngHierarchy::new(seed).rng_for("simulator"),
            ticker: None,
            equity_curve: Vec::new(),
            skips: SkipCounters::default(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn skip_counters(&self) -> SkipCounters {
        self.skips
    }

    pub fn ticker(&self) -> Option<&Ticker> {
        self.ticker.as_ref()
    }

    /// Equity marked at the latest traded price.
    pub fn equity(&self) -> f64 {
        self.account.equity(self.ticker.as_ref().map(|t| t.last))
    }

    /// Restore the initial account, clear the curve and counters, and
    /// reseed the RNG from the session seed. Never called implicitly:
    /// callers reset explicitly between runs.
    pub fn reset(&mut self) {
        self.account.reset();
        self.ticker = None;
        self.equity_curve.clear();
        self.skips = SkipCounters::default();
        self.rng = RngHierarchy::new(self.seed).rng_for("simulator");
    }

    /// Fetch bars for a window, reading through the CSV cache.
    ///
    /// On a miss, pages through the source advancing the cursor to
    /// `last_row.timestamp + 1` until the window is covered or the source
    /// runs dry, then persists the slice.
    pub fn load_historical_data(
        source: &dyn MarketDataSource,
        cache: &BarCache,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Bar>, DataError> {
        if cache.contains(symbol, timeframe, start_ms, end_ms) {
            return cache.load(symbol, timeframe, start_ms, end_ms);
        }

        let mut bars: Vec<Bar> = Vec::new();
        let mut since = start_ms;
        loop {
            let chunk = source.fetch_ohlcv(symbol, timeframe, Some(since), Some(1000))?;
            let Some(last) = chunk.last() else {
                break;
            };
            let next = last.timestamp + 1;
            bars.extend(
                chunk
                    .into_iter()
                    .filter(|b| b.timestamp >= start_ms && b.timestamp <= end_ms),
            );
            if next <= since {
                // Source is not advancing; stop rather than spin.
                break;
            }
            since = next;
            if since > end_ms {
                break;
            }
        }
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);

        if !bars.is_empty() {
            cache.write(symbol, timeframe, start_ms, end_ms, &bars)?;
        }
        Ok(bars)
    }

    /// Replay `bars` through the generator, one forward pass in timestamp
    /// order. Does not reset state first; call [`Simulator::reset`]
    /// between runs.
    pub fn run_backtest(
        &mut self,
        bars: &[Bar],
        generator: &dyn SignalGenerator,
        gate: &mut RiskGate,
    ) -> Result<RunMetrics, SimError> {
        if bars.is_empty() {
            return Err(SimError::NoData {
                symbol: self.symbol.clone(),
            });
        }
        for i in 0..bars.len() {
            // The generator sees data only up to and including bar i.
            self.step(&bars[..=i], generator, gate);
        }
        let equities: Vec<f64> = self.equity_curve.iter().map(|p| p.equity).collect();
        Ok(RunMetrics::compute(&equities, self.timeframe))
    }

    /// Paper-mode single step: identical semantics to one backtest
    /// iteration, driven by an external scheduler. The window is the
    /// visible history, oldest first, current bar last.
    pub fn process_live_bar(
        &mut self,
        window: &[Bar],
        generator: &dyn SignalGenerator,
        gate: &mut RiskGate,
    ) {
        if window.is_empty() {
            return;
        }
        self.step(window, generator, gate);
    }

    fn step(&mut self, window: &[Bar], generator: &dyn SignalGenerator, gate: &mut RiskGate) {
        let bar = &window[window.len() - 1];
        self.ticker = Some(Ticker::from_bar(bar));

        if let Some(position) = self.account.position_mut(&self.symbol) {
            generator.update_trailing_stop(position, bar.close);
        }

        let signal = generator.generate(window, self.account.position(&self.symbol));
        if let Some(signal) = signal {
            self.apply_signal(signal, window, generator, gate, bar.timestamp);
        }

        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.equity(),
            balance: self.account.balance(),
        });
    }

    fn apply_signal(
        &mut self,
        signal: Signal,
        window: &[Bar],
        generator: &dyn SignalGenerator,
        gate: &mut RiskGate,
        now_ms: i64,
    ) {
        match signal {
            Signal::Entry { side, price, .. } => {
                if let Some(reason) = self.try_enter(side, price, window, generator, gate, now_ms) {
                    self.skips.bump(reason);
                }
            }
            Signal::Exit { .. } => self.exit_position(now_ms),
        }
    }

    /// Attempt an entry. Returns the skip reason on rejection, `None`
    /// when a position was opened.
    fn try_enter(
        &mut self,
        side: OrderSide,
        signal_price: f64,
        window: &[Bar],
        generator: &dyn SignalGenerator,
        gate: &mut RiskGate,
        now_ms: i64,
    ) -> Option<SkipReason> {
        if self.account.position(&self.symbol).is_some() {
            return Some(SkipReason::PositionOpen);
        }
        if self.account.position_count() >= self.max_positions {
            return Some(SkipReason::MaxPositions);
        }

        let equity = self.equity();
        let ctx = GateContext {
            equity,
            initial_balance: self.account.initial_balance(),
            now_ms,
            trades: self.account.trades(),
            feed_stale: false,
        };
        if !gate.evaluate(&ctx).entries_allowed() {
            return Some(SkipReason::RiskHalted);
        }

        // Protective levels come from the pre-slippage signal price.
        let (stop_loss, take_profit) = generator.protective_levels(window, signal_price);
        let size = self.sizer.size(equity, signal_price, stop_loss);
        if size <= 0.0 {
            return Some(SkipReason::ZeroSize);
        }

        let fill_price = self.slippage.apply(signal_price, &mut self.rng);
        let fee = self.fees.taker_fee(fill_price, size);
        let cost = fill_price * size + fee;
        if cost > self.account.balance() {
            return Some(SkipReason::InsufficientBalance);
        }

        self.account.debit(cost);
        self.account.open_position(Position {
            symbol: self.symbol.clone(),
            side,
            size,
            entry_price: fill_price,
            stop_loss,
            take_profit,
            trailing: false,
            entry_ts: now_ms,
        });
        self.account.record_trade(Trade {
            timestamp: now_ms,
            symbol: self.symbol.clone(),
            kind: TradeKind::Entry,
            order_id: None,
            side,
            price: fill_price,
            size,
            fee,
            realized_pnl: None,
        });
        None
    }

    /// Close the open position at the current last price with slippage.
    /// Credits the posted capital plus the realized gross, net of the
    /// exit fee (for a long this equals exit notional minus the fee).
    fn exit_position(&mut self, now_ms: i64) {
        let Some(position) = self.account.close_position(&self.symbol) else {
            return;
        };
        let last = self
            .ticker
            .as_ref()
            .map_or(position.entry_price, |t| t.last);
        let exit_price = self.slippage.apply(last, &mut self.rng);
        let fee = self.fees.taker_fee(exit_price, position.size);
        let gross = if position.is_long() {
            (exit_price - position.entry_price) * position.size
        } else {
            (position.entry_price - exit_price) * position.size
        };

        self.account
            .credit(position.entry_price * position.size + gross - fee);
        self.account.record_trade(Trade {
            timestamp: now_ms,
            symbol: position.symbol,
            kind: TradeKind::Exit,
            order_id: None,
            side: position.side.opposite(),
            price: exit_price,
            size: position.size,
            fee,
            realized_pnl: Some(gross - fee),
        });
    }
}
