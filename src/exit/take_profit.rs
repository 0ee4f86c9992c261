// =============================================================================
// Take Profit — fixed exit target armed on entry
// =============================================================================
//
// Long targets fire when price >= level, short targets when price <= level.
// Same one-shot discipline as the stop engine: fired until cancelled.
// =============================================================================

use tracing::{debug, info, warn};

use super::ExitState;
use crate::indicators::Indicator;
use crate::types::{DataPoint, Side, Signal};

#[derive(Debug, Clone, Default)]
pub struct TakeProfit {
    state: ExitState,
}

impl TakeProfit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a target at `level` for a position on `side`.
    pub fn set_take_profit(&mut self, level: f64, side: Side) {
        if side == Side::None {
            self.cancel_take_profit();
            return;
        }
        if !level.is_finite() || level <= 0.0 {
            warn!(%side, level, "refusing to arm take-profit at invalid level");
            self.state = ExitState::Idle;
            return;
        }
        self.state = ExitState::Armed { side, level };
        info!(%side, level, "take-profit armed");
    }

    pub fn cancel_take_profit(&mut self) {
        if self.state != ExitState::Idle {
            debug!(state = ?self.state, "take-profit cancelled");
        }
        self.state = ExitState::Idle;
    }

    /// `StopLong`/`StopShort` once reached, `None` otherwise.  Does not clear.
    pub fn state(&self) -> Signal {
        self.state.signal()
    }

    pub fn exit_state(&self) -> ExitState {
        self.state
    }

    /// Target level for `side`, or 0.0 if nothing is armed for that side.
    pub fn price(&self, side: Side) -> f64 {
        if side != Side::None && self.state.side() == side {
            self.state.level()
        } else {
            0.0
        }
    }
}

impl Indicator for TakeProfit {
    fn update(&mut self, datapoint: &DataPoint) {
        let price = datapoint.price();
        if !price.is_finite() || price <= 0.0 {
            return;
        }

        if let ExitState::Armed { side, level } = self.state {
            let reached = match side {
                Side::Long => price >= level,
                Side::Short => price <= level,
                Side::None => false,
            };
            if reached {
                info!(%side, level, price, "take-profit reached");
                self.state = ExitState::Fired { side, level };
            }
        }
    }

    fn seen_enough_data(&self) -> bool {
        true
    }

    fn amount_of_data_still_missing(&self) -> usize {
        0
    }
}
