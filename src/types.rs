// =============================================================================
// Shared types used across the trading bot
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

/// Which side of the market a position (or an armed stop) is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    None,
    Long,
    Short,
}

impl Default for Side {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Long => write!(f, "Long"),
            Self::Short => write!(f, "Short"),
        }
    }
}

/// Output of an indicator that drives the strategy.
///
/// Entry signals come from the crossover detector; stop signals come from the
/// stop engine, the take-profit and the time stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    None,
    EnterLong,
    EnterShort,
    StopLong,
    StopShort,
}

impl Default for Signal {
    fn default() -> Self {
        Self::None
    }
}

impl Signal {
    /// True for the two "get out" signals.
    pub fn is_stop(self) -> bool {
        matches!(self, Self::StopLong | Self::StopShort)
    }

    /// Stop signal matching a position side. `Side::None` maps to `None`.
    pub fn stop_for(side: Side) -> Self {
        match side {
            Side::Long => Self::StopLong,
            Side::Short => Self::StopShort,
            Side::None => Self::None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::EnterLong => write!(f, "EnterLong"),
            Self::EnterShort => write!(f, "EnterShort"),
            Self::StopLong => write!(f, "StopLong"),
            Self::StopShort => write!(f, "StopShort"),
        }
    }
}

/// Which side(s) a close-position request applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseTarget {
    Long,
    Short,
    Both,
}

impl CloseTarget {
    /// Whether closing this target flattens a position on `side`.
    pub fn covers(self, side: Side) -> bool {
        match self {
            Self::Both => side != Side::None,
            Self::Long => side == Side::Long,
            Self::Short => side == Side::Short,
        }
    }
}

impl std::fmt::Display for CloseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Lifecycle state of the strategy controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    Stopped,
    Priming,
    Trading,
    Paused,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Priming => write!(f, "Priming"),
            Self::Trading => write!(f, "Trading"),
            Self::Paused => write!(f, "Paused"),
        }
    }
}

/// A single timestamped price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Unix seconds (fractional).
    pub timestamp: f64,
    pub price: f64,
}

impl Tick {
    pub fn new(timestamp: f64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Anything that can be pushed through the indicator pipeline.
///
/// Finished candles and raw ticks are told apart by variant, never by
/// inspecting fields.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPoint {
    Tick(Tick),
    Candle(Candle),
}

impl DataPoint {
    /// The price an indicator should consume: the tick price or the candle close.
    pub fn price(&self) -> f64 {
        match self {
            Self::Tick(t) => t.price,
            Self::Candle(c) => c.close,
        }
    }

    /// Timestamp of the observation: the tick time or the candle close time.
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Tick(t) => t.timestamp,
            Self::Candle(c) => c.close_time,
        }
    }
}

impl From<Tick> for DataPoint {
    fn from(tick: Tick) -> Self {
        Self::Tick(tick)
    }
}

impl From<Candle> for DataPoint {
    fn from(candle: Candle) -> Self {
        Self::Candle(candle)
    }
}
