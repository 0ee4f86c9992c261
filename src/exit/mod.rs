// =============================================================================
// Exit Management Module
// =============================================================================
//
// Stop engine (fixed or ATR-trailing stop-loss), take-profit target and the
// calendar time stop.  Stops and targets follow a one-shot discipline:
//
//   Idle --arm--> Armed --breach--> Fired
//   Armed | Fired --cancel--> Idle
//
// Reading the state never clears it.  The strategy must cancel explicitly
// after acting on a fired exit, otherwise the exit keeps reporting.

pub mod stop;
pub mod take_profit;
pub mod time_stop;

pub use stop::StopEngine;
pub use take_profit::TakeProfit;
pub use time_stop::TimeStop;

use serde::{Deserialize, Serialize};

use crate::types::{Side, Signal};

/// Arm-cycle state shared by the stop engine and the take-profit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExitState {
    Idle,
    Armed { side: Side, level: f64 },
    Fired { side: Side, level: f64 },
}

impl Default for ExitState {
    fn default() -> Self {
        Self::Idle
    }
}

impl ExitState {
    /// `StopLong`/`StopShort` while fired, `None` otherwise.
    pub fn signal(&self) -> Signal {
        match self {
            Self::Fired { side, .. } => Signal::stop_for(*side),
            _ => Signal::None,
        }
    }

    /// Level of the armed or fired exit, 0.0 when idle.
    pub fn level(&self) -> f64 {
        match self {
            Self::Armed { level, .. } | Self::Fired { level, .. } => *level,
            Self::Idle => 0.0,
        }
    }

    /// Side the exit is armed for, `Side::None` when idle.
    pub fn side(&self) -> Side {
        match self {
            Self::Armed { side, .. } | Self::Fired { side, .. } => *side,
            Self::Idle => Side::None,
        }
    }
}
