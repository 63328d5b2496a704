//! Session configuration: TOML file, validation, run fingerprint.
//!
//! The config is validated before any component is constructed; nothing in
//! the engine ever sees an out-of-range parameter. There is no global
//! config instance — the loaded value is passed down explicitly.

use crate::domain::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("ema_short ({short}) must be less than ema_long ({long})")]
    EmaOrdering { short: usize, long: usize },
    #[error("symbol must be BASE/QUOTE, got {0:?}")]
    BadSymbol(String),
    #[error("unsupported venue: {0:?}")]
    UnsupportedVenue(String),
    #[error("backtest_start must precede backtest_end")]
    BacktestWindow,
    #[error("simulated mode requires backtest_start and backtest_end")]
    MissingBacktestWindow,
}

/// Which back end the order manager routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Fills simulated locally against the synthetic ticker.
    Simulated,
    /// Orders recorded but never sent anywhere.
    DryRun,
    /// Orders forwarded to the live exchange sink.
    Live,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    pub mode: ExecutionMode,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub backtest_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub backtest_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSection {
    #[serde(default = "default_venue")]
    pub venue: String,
    pub symbol: String,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    pub ema_short: usize,
    pub ema_long: usize,
    /// Pullback depth below the short EMA, in percent.
    pub pullback_pct: f64,
    /// Equity fraction risked per trade, in percent.
    pub risk_pct_per_trade: f64,
    /// Entries are suppressed while ATR/close exceeds this, in percent.
    pub volatility_threshold: f64,
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSection {
    pub max_daily_loss_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_positions: usize,
    pub max_consecutive_losses: u32,
    /// How long entries stay suspended after a hard stop trips.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSection {
    pub initial_balance: f64,
    pub latency_ms: u64,
    pub slippage_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSection {
    pub maker_bps: u32,
    pub taker_bps: u32,
}

fn default_venue() -> String {
    "kraken".to_string()
}

fn default_atr_period() -> usize {
    14
}

fn default_cooldown_secs() -> u64 {
    900
}

/// Complete session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub session: SessionSection,
    pub exchange: ExchangeSection,
    pub strategy: StrategySection,
    pub risk: RiskSection,
    pub paper: PaperSection,
    pub fees: FeeSection,
}

impl SessionConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Range and consistency checks. Fatal at startup: the engine never
    /// constructs with an invalid configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange.venue != "kraken" {
            return Err(ConfigError::UnsupportedVenue(self.exchange.venue.clone()));
        }
        if !self.exchange.symbol.contains('/') {
            return Err(ConfigError::BadSymbol(self.exchange.symbol.clone()));
        }

        let s = &self.strategy;
        range_u("ema_short", s.ema_short as u64, 1, 50)?;
        range_u("ema_long", s.ema_long as u64, 5, 200)?;
        if s.ema_short >= s.ema_long {
            return Err(ConfigError::EmaOrdering {
                short: s.ema_short,
                long: s.ema_long,
            });
        }
        range_f("pullback_pct", s.pullback_pct, 0.1, 5.0)?;
        range_f("risk_pct_per_trade", s.risk_pct_per_trade, 0.1, 5.0)?;
        range_f("volatility_threshold", s.volatility_threshold, 0.5, 10.0)?;
        range_u("atr_period", s.atr_period as u64, 1, 100)?;

        let r = &self.risk;
        range_f("max_daily_loss_pct", r.max_daily_loss_pct, 0.1, 20.0)?;
        range_f("max_drawdown_pct", r.max_drawdown_pct, 1.0, 50.0)?;
        range_u("max_positions", r.max_positions as u64, 1, 10)?;
        range_u(
            "max_consecutive_losses",
            u64::from(r.max_consecutive_losses),
            1,
            10,
        )?;

        let p = &self.paper;
        if p.initial_balance < 100.0 {
            return Err(ConfigError::OutOfRange {
                field: "initial_balance",
                value: p.initial_balance,
                min: 100.0,
                max: f64::INFINITY,
            });
        }
        range_u("latency_ms", p.latency_ms, 0, 1000)?;
        range_u("slippage_ticks", u64::from(p.slippage_ticks), 0, 10)?;

        range_u("maker_bps", u64::from(self.fees.maker_bps), 0, 100)?;
        range_u("taker_bps", u64::from(self.fees.taker_bps), 0, 100)?;

        match (self.session.backtest_start, self.session.backtest_end) {
            (Some(start), Some(end)) if start >= end => return Err(ConfigError::BacktestWindow),
            (Some(_), Some(_)) => {}
            (None, None) if self.session.mode != ExecutionMode::Simulated => {}
            _ => return Err(ConfigError::MissingBacktestWindow),
        }

        Ok(())
    }

    /// Deterministic content hash of the full configuration. Two sessions
    /// with identical configs share a fingerprint, which names the artifact
    /// directory and keys result caches.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("SessionConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session: SessionSection {
                mode: ExecutionMode::Simulated,
                seed: 42,
                backtest_start: None,
                backtest_end: None,
            },
            exchange: ExchangeSection {
                venue: default_venue(),
                symbol: "BTC/USD".to_string(),
                timeframe: Timeframe::M1,
            },
            strategy: StrategySection {
                ema_short: 9,
                ema_long: 21,
                pullback_pct: 0.5,
                risk_pct_per_trade: 1.0,
                volatility_threshold: 3.0,
                atr_period: default_atr_period(),
            },
            risk: RiskSection {
                max_daily_loss_pct: 5.0,
                max_drawdown_pct: 10.0,
                max_positions: 1,
                max_consecutive_losses: 3,
                cooldown_secs: default_cooldown_secs(),
            },
            paper: PaperSection {
                initial_balance: 10_000.0,
                latency_ms: 50,
                slippage_ticks: 2,
            },
            fees: FeeSection {
                maker_bps: 16,
                taker_bps: 26,
            },
        }
    }
}

fn range_f(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max || !value.is_finite() {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn range_u(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        });
    }
    Ok(())
}
