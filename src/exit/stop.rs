// =============================================================================
// Stop Engine — fixed stop-loss or ATR trailing stop
// =============================================================================
//
// Fixed:    the level given at arm time (or last price -/+ the configured
//           distance) never moves.
//
// Trailing: the distance is `multiplier * ATR(period)`, falling back to the
//           configured distance until the ATR is seeded.  The level follows
//           the best price seen since arming and only ever tightens:
//             long : level = max(level, best - distance)
//             short: level = min(level, best + distance)
//
// Breach (price <= level for a long, price >= level for a short) moves the
// engine to Fired, where it stays until `cancel_stop()`.
// =============================================================================

use tracing::{debug, info, warn};

use super::ExitState;
use crate::indicators::atr::AverageTrueRange;
use crate::indicators::Indicator;
use crate::types::{DataPoint, Side, Signal};

#[derive(Debug, Clone)]
enum StopRule {
    Fixed,
    Trailing {
        atr: AverageTrueRange,
        multiplier: f64,
    },
}

#[derive(Debug, Clone)]
pub struct StopEngine {
    rule: StopRule,
    /// Distance used by the fixed rule, and by the trailing rule until the
    /// ATR is seeded.
    distance: f64,
    state: ExitState,
    /// Best price since arming (highest for long, lowest for short).
    best_price: f64,
    last_price: f64,
}

impl StopEngine {
    pub fn fixed(distance: f64) -> Self {
        Self::with_rule(StopRule::Fixed, distance)
    }

    pub fn trailing(period: usize, multiplier: f64, fallback_distance: f64) -> Self {
        Self::with_rule(
            StopRule::Trailing {
                atr: AverageTrueRange::new(period),
                multiplier,
            },
            fallback_distance,
        )
    }

    fn with_rule(rule: StopRule, distance: f64) -> Self {
        Self {
            rule,
            distance: distance.abs(),
            state: ExitState::Idle,
            best_price: 0.0,
            last_price: 0.0,
        }
    }

    pub fn is_trailing(&self) -> bool {
        matches!(self.rule, StopRule::Trailing { .. })
    }

    /// Current stop distance in price units.
    pub fn distance(&self) -> f64 {
        match &self.rule {
            StopRule::Fixed => self.distance,
            StopRule::Trailing { atr, multiplier } => atr
                .value()
                .map(|v| v * multiplier)
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(self.distance),
        }
    }

    /// Arm a stop for `side`.
    ///
    /// With `level == None` the level is derived from the last seen price and
    /// the current distance.  Arming replaces any previous arm cycle, fired or
    /// not.  Arming `Side::None` cancels.
    pub fn set_stop(&mut self, side: Side, level: Option<f64>) {
        if side == Side::None {
            self.cancel_stop();
            return;
        }

        let distance = self.distance();
        let level = match level {
            Some(l) if l.is_finite() && l > 0.0 => l,
            _ if self.last_price > 0.0 => match side {
                Side::Long => self.last_price - distance,
                _ => self.last_price + distance,
            },
            _ => {
                warn!(%side, "cannot arm stop: no price seen yet");
                self.state = ExitState::Idle;
                return;
            }
        };

        self.best_price = if self.last_price > 0.0 { self.last_price } else { level };
        self.state = ExitState::Armed { side, level };
        info!(%side, level, distance, trailing = self.is_trailing(), "stop armed");
    }

    /// Disarm.  Re-arming needs a new `set_stop`.
    pub fn cancel_stop(&mut self) {
        if self.state != ExitState::Idle {
            debug!(state = ?self.state, "stop cancelled");
        }
        self.state = ExitState::Idle;
    }

    /// `StopLong`/`StopShort` once breached, `None` otherwise.  Does not clear.
    pub fn state(&self) -> Signal {
        self.state.signal()
    }

    pub fn exit_state(&self) -> ExitState {
        self.state
    }

    /// Armed (or fired) level, 0.0 when idle.
    pub fn price(&self) -> f64 {
        self.state.level()
    }

    fn trail(&mut self, side: Side, level: f64, price: f64) -> f64 {
        if !self.is_trailing() {
            return level;
        }
        let distance = self.distance();
        match side {
            Side::Long => {
                self.best_price = self.best_price.max(price);
                level.max(self.best_price - distance)
            }
            Side::Short => {
                self.best_price = self.best_price.min(price);
                level.min(self.best_price + distance)
            }
            Side::None => level,
        }
    }
}

impl Indicator for StopEngine {
    fn update(&mut self, datapoint: &DataPoint) {
        if let StopRule::Trailing { atr, .. } = &mut self.rule {
            atr.update(datapoint);
        }

        let price = datapoint.price();
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        self.last_price = price;

        let ExitState::Armed { side, level } = self.state else {
            return;
        };

        let level = self.trail(side, level, price);
        let breached = match side {
            Side::Long => price <= level,
            Side::Short => price >= level,
            Side::None => false,
        };

        self.state = if breached {
            info!(%side, level, price, "stop triggered");
            ExitState::Fired { side, level }
        } else {
            ExitState::Armed { side, level }
        };
    }

    fn seen_enough_data(&self) -> bool {
        match &self.rule {
            StopRule::Fixed => true,
            StopRule::Trailing { atr, .. } => atr.seen_enough_data(),
        }
    }

    fn amount_of_data_still_missing(&self) -> usize {
        match &self.rule {
            StopRule::Fixed => 0,
            StopRule::Trailing { atr, .. } => atr.amount_of_data_still_missing(),
        }
    }
}
