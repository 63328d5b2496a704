//! Risk gate — circuit breakers consulted before every new entry.
//!
//! Hard breakers compare equity against the session's initial balance:
//! a daily-loss breach or a drawdown breach suspends entries for a
//! cool-down interval. The soft guard counts consecutive realized losses
//! and clears on the next winning trade. Sustained feed staleness halts
//! entries exactly like a tripped breaker. Exits are never gated.

use crate::config::RiskSection;
use crate::domain::Trade;

/// Why entries are currently suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    DailyLoss,
    Drawdown,
    LossStreak,
    StaleData,
    CoolingDown,
}

/// Gate verdict for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    EntriesAllowed,
    Halted(HaltReason),
}

impl GateDecision {
    pub fn entries_allowed(&self) -> bool {
        matches!(self, Self::EntriesAllowed)
    }
}

/// Everything the gate reads in one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub equity: f64,
    pub initial_balance: f64,
    /// Epoch milliseconds of the decision point (bar timestamp in
    /// backtests, wall clock live).
    pub now_ms: i64,
    pub trades: &'a [Trade],
    pub feed_stale: bool,
}

#[derive(Debug, Clone)]
pub struct RiskGate {
    max_daily_loss_frac: f64,
    max_drawdown_frac: f64,
    max_consecutive_losses: u32,
    cooldown_ms: i64,
    halted_until: Option<i64>,
}

impl RiskGate {
    pub fn new(
        max_daily_loss_pct: f64,
        max_drawdown_pct: f64,
        max_consecutive_losses: u32,
        cooldown_secs: u64,
    ) -> Self {
        assert!(max_daily_loss_pct > 0.0, "max_daily_loss_pct must be positive");
        assert!(max_drawdown_pct > 0.0, "max_drawdown_pct must be positive");
        assert!(
            max_consecutive_losses >= 1,
            "max_consecutive_losses must be >= 1"
        );
        Self {
            max_daily_loss_frac: max_daily_loss_pct / 100.0,
            max_drawdown_frac: max_drawdown_pct / 100.0,
            max_consecutive_losses,
            cooldown_ms: (cooldown_secs as i64) * 1000,
            halted_until: None,
        }
    }

    pub fn from_config(risk: &RiskSection) -> Self {
        Self::new(
            risk.max_daily_loss_pct,
            risk.max_drawdown_pct,
            risk.max_consecutive_losses,
            risk.cooldown_secs,
        )
    }

    /// Pure hard-stop check: true when trading may continue.
    pub fn check_hard_stops(&self, equity: f64, initial_balance: f64) -> bool {
        if !(initial_balance > 0.0) {
            return false;
        }
        let daily_loss = (initial_balance - equity) / initial_balance;
        if daily_loss >= self.max_daily_loss_frac {
            return false;
        }
        if equity < initial_balance * (1.0 - self.max_drawdown_frac) {
            return false;
        }
        true
    }

    /// Count of realized losses since the last non-losing exit. Entry legs
    /// carry no realized P&L and are skipped.
    pub fn consecutive_losses(trades: &[Trade]) -> u32 {
        let mut streak = 0;
        for trade in trades.iter().rev() {
            match trade.realized_pnl {
                Some(pnl) if pnl < 0.0 => streak += 1,
                Some(_) => break,
                None => continue,
            }
        }
        streak
    }

    /// Evaluate the gate for this cycle. Tripping a hard breaker arms the
    /// cool-down; while it runs the gate reports `CoolingDown`, after which
    /// the breakers are re-checked from scratch.
    pub fn evaluate(&mut self, ctx: &GateContext<'_>) -> GateDecision {
        if let Some(until) = self.halted_until {
            if ctx.now_ms < until {
                return GateDecision::Halted(HaltReason::CoolingDown);
            }
            self.halted_until = None;
        }

        if !(ctx.initial_balance > 0.0) {
            self.halted_until = Some(ctx.now_ms + self.cooldown_ms);
            return GateDecision::Halted(HaltReason::Drawdown);
        }

        let daily_loss = (ctx.initial_balance - ctx.equity) / ctx.initial_balance;
        if daily_loss >= self.max_daily_loss_frac {
            self.halted_until = Some(ctx.now_ms + self.cooldown_ms);
            return GateDecision::Halted(HaltReason::DailyLoss);
        }
        if ctx.equity < ctx.initial_balance * (1.0 - self.max_drawdown_frac) {
            self.halted_until = Some(ctx.now_ms + self.cooldown_ms);
            return GateDecision::Halted(HaltReason::Drawdown);
        }

        if Self::consecutive_losses(ctx.trades) >= self.max_consecutive_losses {
            return GateDecision::Halted(HaltReason::LossStreak);
        }

        if ctx.feed_stale {
            return GateDecision::Halted(HaltReason::StaleData);
        }

        GateDecision::EntriesAllowed
    }
}
