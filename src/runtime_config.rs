// =============================================================================
// Runtime Configuration — bot settings with atomic save
// =============================================================================
//
// One explicit configuration struct, built once at startup and handed by
// reference to the strategy controller, the risk manager and the exchange
// adapter.  Nothing reads settings from globals.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_instrument() -> String {
    "EUR_USD".to_string()
}

fn default_account_currency() -> String {
    "USD".to_string()
}

fn default_candle_minutes() -> u32 {
    1
}

fn default_short_period() -> usize {
    10
}

fn default_medium_period() -> usize {
    50
}

fn default_long_period() -> usize {
    100
}

fn default_risk_percent() -> f64 {
    2.0
}

fn default_stop_loss_distance() -> f64 {
    0.0020
}

fn default_trailing_period() -> usize {
    7
}

fn default_trailing_multiplier() -> f64 {
    3.0
}

fn default_take_profit_distance() -> f64 {
    0.0040
}

fn default_true() -> bool {
    true
}

fn default_cutoff_hour() -> u32 {
    20
}

fn default_reopen_hour() -> u32 {
    22
}

fn default_watchdog_timeout_secs() -> u64 {
    600
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_heartbeat_every() -> usize {
    100
}

fn default_leverage() -> f64 {
    20.0
}

fn default_starting_balance() -> f64 {
    10_000.0
}

// =============================================================================
// StopMode
// =============================================================================

/// How the stop-loss level is maintained once armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopMode {
    /// Fixed distance from entry, never moves.
    Fixed,
    /// ATR-scaled distance that only tightens in the position's favour.
    Trailing,
}

impl Default for StopMode {
    fn default() -> Self {
        Self::Trailing
    }
}

impl std::fmt::Display for StopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "Fixed"),
            Self::Trailing => write!(f, "Trailing"),
        }
    }
}

// =============================================================================
// StrategyParams
// =============================================================================

/// Moving-average periods and order sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParams {
    #[serde(default = "default_short_period")]
    pub short_period: usize,

    #[serde(default = "default_medium_period")]
    pub medium_period: usize,

    #[serde(default = "default_long_period")]
    pub long_period: usize,

    /// Percentage of net worth put at risk per trade (e.g. 2.0 means 2 %).
    #[serde(default = "default_risk_percent")]
    pub risk_percent: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            short_period: default_short_period(),
            medium_period: default_medium_period(),
            long_period: default_long_period(),
            risk_percent: default_risk_percent(),
        }
    }
}

// =============================================================================
// ExitParams
// =============================================================================

/// Stop-loss, take-profit and weekend time-stop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitParams {
    #[serde(default)]
    pub stop_mode: StopMode,

    /// Stop distance in price units.  Used as-is in `Fixed` mode and as the
    /// fallback in `Trailing` mode until the ATR has enough candles.
    #[serde(default = "default_stop_loss_distance")]
    pub stop_loss_distance: f64,

    /// ATR period for the trailing stop.
    #[serde(default = "default_trailing_period")]
    pub trailing_period: usize,

    /// Trailing distance = ATR * multiplier.
    #[serde(default = "default_trailing_multiplier")]
    pub trailing_multiplier: f64,

    /// Take-profit distance from entry in price units.
    #[serde(default = "default_take_profit_distance")]
    pub take_profit_distance: f64,

    /// Flatten before the weekend.
    #[serde(default = "default_true")]
    pub time_stop_enabled: bool,

    /// Friday hour (UTC) from which trading halts.
    #[serde(default = "default_cutoff_hour")]
    pub friday_cutoff_hour: u32,

    /// Sunday hour (UTC) at which trading resumes.
    #[serde(default = "default_reopen_hour")]
    pub sunday_reopen_hour: u32,
}

impl Default for ExitParams {
    fn default() -> Self {
        Self {
            stop_mode: StopMode::default(),
            stop_loss_distance: default_stop_loss_distance(),
            trailing_period: default_trailing_period(),
            trailing_multiplier: default_trailing_multiplier(),
            take_profit_distance: default_take_profit_distance(),
            time_stop_enabled: true,
            friday_cutoff_hour: default_cutoff_hour(),
            sunday_reopen_hour: default_reopen_hour(),
        }
    }
}

// =============================================================================
// FeedParams
// =============================================================================

/// Price queue and liveness watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedParams {
    /// Seconds without any tick or heartbeat before the feed is declared dead.
    #[serde(default = "default_watchdog_timeout_secs")]
    pub watchdog_timeout_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long the consumer waits for the next message per pull.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Replay sends a heartbeat after this many ticks (0 disables).
    #[serde(default = "default_heartbeat_every")]
    pub heartbeat_every: usize,
}

impl Default for FeedParams {
    fn default() -> Self {
        Self {
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_every: default_heartbeat_every(),
        }
    }
}

impl FeedParams {
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs(self.watchdog_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// PaperAccount
// =============================================================================

/// Simulated account used for backtests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperAccount {
    #[serde(default = "default_leverage")]
    pub leverage: f64,

    /// Opening balance in the account currency.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,
}

impl Default for PaperAccount {
    fn default() -> Self {
        Self {
            leverage: default_leverage(),
            starting_balance: default_starting_balance(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the bot.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Instrument traded, broker notation (e.g. `EUR_USD`).
    #[serde(default = "default_instrument")]
    pub instrument: String,

    /// Currency net worth is reported in.
    #[serde(default = "default_account_currency")]
    pub account_currency: String,

    /// Candle size the strategy aggregates ticks into.
    #[serde(default = "default_candle_minutes")]
    pub candle_minutes: u32,

    #[serde(default)]
    pub strategy: StrategyParams,

    #[serde(default)]
    pub exits: ExitParams,

    #[serde(default)]
    pub feed: FeedParams,

    #[serde(default)]
    pub paper: PaperAccount,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            account_currency: default_account_currency(),
            candle_minutes: default_candle_minutes(),
            strategy: StrategyParams::default(),
            exits: ExitParams::default(),
            feed: FeedParams::default(),
            paper: PaperAccount::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid runtime config in {}", path.display()))?;

        info!(
            path = %path.display(),
            instrument = %config.instrument,
            candle_minutes = config.candle_minutes,
            stop_mode = %config.exits.stop_mode,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Reject settings the strategy cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.instrument.trim().is_empty(), "instrument must be set");
        ensure!(self.candle_minutes > 0, "candle_minutes must be positive");

        let s = &self.strategy;
        ensure!(
            s.short_period > 0 && s.medium_period > 0 && s.long_period > 0,
            "moving-average periods must be positive"
        );
        ensure!(
            s.risk_percent.is_finite() && s.risk_percent > 0.0 && s.risk_percent <= 100.0,
            "risk_percent must be in (0, 100], got {}",
            s.risk_percent
        );

        let e = &self.exits;
        ensure!(
            e.stop_loss_distance.is_finite() && e.stop_loss_distance > 0.0,
            "stop_loss_distance must be positive"
        );
        ensure!(
            e.take_profit_distance.is_finite() && e.take_profit_distance > 0.0,
            "take_profit_distance must be positive"
        );
        if e.stop_mode == StopMode::Trailing {
            ensure!(e.trailing_period > 0, "trailing_period must be positive");
            ensure!(
                e.trailing_multiplier.is_finite() && e.trailing_multiplier > 0.0,
                "trailing_multiplier must be positive"
            );
        }
        ensure!(
            e.friday_cutoff_hour <= 24 && e.sunday_reopen_hour <= 24,
            "time-stop hours must be within 0..=24"
        );

        ensure!(self.feed.watchdog_timeout_secs > 0, "watchdog_timeout_secs must be positive");
        ensure!(self.feed.queue_capacity > 0, "queue_capacity must be positive");

        ensure!(
            self.paper.leverage.is_finite() && self.paper.leverage > 0.0,
            "leverage must be positive, got {}",
            self.paper.leverage
        );
        Ok(())
    }
}
