//! EMA pullback generator — trend-following entries on a dip.
//!
//! Trend: short EMA above long EMA. Entry: the previous close held above
//! the short EMA and the current close has pulled back to or below
//! `short_ema * (1 - pullback)`. Exits are evaluated first and in fixed
//! priority: stop-loss, take-profit, trend reversal. An elevated ATR
//! (ATR/close above the volatility threshold) suppresses entries for the
//! cycle but never blocks an exit.

use crate::domain::{Bar, OrderSide, Position};
use crate::indicators::{atr, ema};

use super::{EntryReason, ExitReason, Signal, SignalGenerator};

#[derive(Debug, Clone)]
pub struct EmaPullback {
    short_period: usize,
    long_period: usize,
    /// Pullback depth below the short EMA, as a fraction.
    pullback_frac: f64,
    /// ATR/close ceiling for entries, as a fraction.
    volatility_frac: f64,
    atr_period: usize,
}

impl EmaPullback {
    /// Percent inputs are converted to fractions once, here.
    pub fn new(
        short_period: usize,
        long_period: usize,
        pullback_pct: f64,
        volatility_threshold: f64,
        atr_period: usize,
    ) -> Self {
        assert!(short_period >= 1, "short_period must be >= 1");
        assert!(
            long_period > short_period,
            "long_period must exceed short_period"
        );
        assert!(pullback_pct > 0.0, "pullback_pct must be positive");
        assert!(
            volatility_threshold > 0.0,
            "volatility_threshold must be positive"
        );
        assert!(atr_period >= 1, "atr_period must be >= 1");
        Self {
            short_period,
            long_period,
            pullback_frac: pullback_pct / 100.0,
            volatility_frac: volatility_threshold / 100.0,
            atr_period,
        }
    }

    pub fn from_config(strategy: &crate::config::StrategySection) -> Self {
        Self::new(
            strategy.ema_short,
            strategy.ema_long,
            strategy.pullback_pct,
            strategy.volatility_threshold,
            strategy.atr_period,
        )
    }
}

impl SignalGenerator for EmaPullback {
    fn name(&self) -> &str {
        "ema_pullback"
    }

    fn warmup_bars(&self) -> usize {
        self.short_period.max(self.long_period).max(self.atr_period)
    }

    fn generate(&self, window: &[Bar], position: Option<&Position>) -> Option<Signal> {
        if window.len() < self.warmup_bars() {
            return None;
        }

        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let short = ema(&closes, self.short_period);
        let long = ema(&closes, self.long_period);
        let atr_series = atr(window, self.atr_period);

        let last = window.len() - 1;
        let close = closes[last];
        let short_now = short[last];
        let long_now = long[last];
        let atr_now = atr_series[last];
        if !(close.is_finite() && short_now.is_finite() && long_now.is_finite()) {
            return None;
        }
        let trend_up = short_now > long_now;

        // Exits first; an open position is managed regardless of volatility.
        if let Some(pos) = position {
            if close <= pos.stop_loss {
                return Some(Signal::Exit {
                    reason: ExitReason::StopLoss,
                });
            }
            if close >= pos.take_profit {
                return Some(Signal::Exit {
                    reason: ExitReason::TakeProfit,
                });
            }
            if !trend_up {
                return Some(Signal::Exit {
                    reason: ExitReason::TrendReversal,
                });
            }
            return None;
        }

        // Entries sit out elevated volatility.
        if !atr_now.is_finite() || atr_now / close > self.volatility_frac {
            return None;
        }
        if !trend_up {
            return None;
        }

        // Pullback: previous close held above the short EMA and the current
        // close dipped to the buy level.
        let prev_close = closes[last - 1];
        let pullback_level = short_now * (1.0 - self.pullback_frac);
        if prev_close > short_now && close <= pullback_level {
            return Some(Signal::Entry {
                side: OrderSide::Buy,
                price: pullback_level,
                reason: EntryReason::PullbackEntry,
            });
        }

        None
    }
}
