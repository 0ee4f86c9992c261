// =============================================================================
// Moving-Average Crossover Detector (MACross)
// =============================================================================
//
// Three averages: short, medium and long.  Each update computes
//
//   buy_cross  = short > medium && short > long
//   sell_cross = short < medium && short < long
//
// and compares the pair against the previous update.  Only a rising edge
// (false -> true) produces a signal:
//
//   buy_cross  rises -> EnterLong
//   sell_cross rises -> EnterShort
//   otherwise        -> None
//
// so a persisting cross never re-signals.  Until the long average is ready
// the cross pair is held at (false, false), which keeps the unseeded long
// SMA (reading 0.0) from faking a buy cross.
// =============================================================================

use tracing::debug;

use super::moving_average::{ExponentialMovingAverage, MovingAverage, SimpleMovingAverage};
use super::Indicator;
use crate::types::{DataPoint, Signal};

/// `(buy_cross, sell_cross)`.
type CrossPair = (bool, bool);

pub struct MACross {
    short: Box<dyn MovingAverage>,
    medium: Box<dyn MovingAverage>,
    long: Box<dyn MovingAverage>,
    previous_cross: CrossPair,
    current_cross: CrossPair,
    state: Signal,
}

impl MACross {
    /// Standard layout: EMA(short), EMA(medium), SMA(long).
    pub fn new(short: usize, medium: usize, long: usize) -> Self {
        Self::with_averages(
            Box::new(ExponentialMovingAverage::new(short)),
            Box::new(ExponentialMovingAverage::new(medium)),
            Box::new(SimpleMovingAverage::new(long)),
        )
    }

    /// Build from arbitrary averages.  Periods are expected to increase from
    /// short to long but this is not enforced.
    pub fn with_averages(
        short: Box<dyn MovingAverage>,
        medium: Box<dyn MovingAverage>,
        long: Box<dyn MovingAverage>,
    ) -> Self {
        Self {
            short,
            medium,
            long,
            previous_cross: (false, false),
            current_cross: (false, false),
            state: Signal::None,
        }
    }

    /// Signal produced by the most recent update.
    pub fn state(&self) -> Signal {
        self.state
    }

    /// Current `(short, medium, long)` values.
    pub fn values(&self) -> (f64, f64, f64) {
        (self.short.value(), self.medium.value(), self.long.value())
    }

    fn check_crosses(&self) -> CrossPair {
        let (s, m, l) = self.values();
        (s > m && s > l, s < m && s < l)
    }
}

impl Indicator for MACross {
    fn update(&mut self, datapoint: &DataPoint) {
        self.short.update(datapoint);
        self.medium.update(datapoint);
        self.long.update(datapoint);

        self.previous_cross = self.current_cross;
        self.current_cross = if self.long.seen_enough_data() {
            self.check_crosses()
        } else {
            (false, false)
        };

        self.state = match (self.previous_cross, self.current_cross) {
            ((false, _), (true, _)) => Signal::EnterLong,
            ((_, false), (_, true)) => Signal::EnterShort,
            _ => Signal::None,
        };

        if self.state != Signal::None {
            let (s, m, l) = self.values();
            debug!(short = s, medium = m, long = l, state = %self.state, "crossover edge");
        }
    }

    fn seen_enough_data(&self) -> bool {
        self.long.seen_enough_data()
    }

    fn amount_of_data_still_missing(&self) -> usize {
        self.long.amount_of_data_still_missing()
    }
}

impl std::fmt::Debug for MACross {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (s, m, l) = self.values();
        f.debug_struct("MACross")
            .field("short", &s)
            .field("medium", &m)
            .field("long", &l)
            .field("current_cross", &self.current_cross)
            .field("state", &self.state)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;

    fn close(price: f64) -> DataPoint {
        DataPoint::Candle(Candle::closed(0.0, 60.0, price, price, price, price).unwrap())
    }

    fn primed_flat(cross: &mut MACross, price: f64, n: usize) {
        for _ in 0..n {
            cross.update(&close(price));
        }
    }

    #[test]
    fn flat_data_never_crosses() {
        let mut cross = MACross::new(2, 3, 5);
        primed_flat(&mut cross, 1.0, 5);
        assert!(cross.seen_enough_data());
        for _ in 0..3 {
            cross.update(&close(1.0));
            assert_eq!(cross.state(), Signal::None);
        }
    }

    #[test]
    fn rising_edge_fires_once() {
        let mut cross = MACross::new(2, 3, 5);
        primed_flat(&mut cross, 1.0, 5);

        cross.update(&close(1.1));
        assert_eq!(cross.state(), Signal::EnterLong);

        // The cross persists while price keeps rising: no re-fire.
        for p in [1.2, 1.3, 1.4] {
            cross.update(&close(p));
            assert_eq!(cross.state(), Signal::None);
        }
    }

    #[test]
    fn falling_prices_enter_short() {
        let mut cross = MACross::new(2, 3, 5);
        primed_flat(&mut cross, 1.0, 5);
        cross.update(&close(0.9));
        assert_eq!(cross.state(), Signal::EnterShort);
        cross.update(&close(0.8));
        assert_eq!(cross.state(), Signal::None);
    }

    #[test]
    fn refires_after_cross_is_lost() {
        let mut cross = MACross::new(2, 3, 5);
        primed_flat(&mut cross, 1.0, 5);
        cross.update(&close(1.1));
        assert_eq!(cross.state(), Signal::EnterLong);

        // Drop hard enough to flip into a sell cross, then recover.
        cross.update(&close(0.8));
        assert_eq!(cross.state(), Signal::EnterShort);
        cross.update(&close(1.5));
        assert_eq!(cross.state(), Signal::EnterLong);
    }

    #[test]
    fn no_signal_before_long_average_ready() {
        let mut cross = MACross::new(2, 3, 5);
        for p in [1.0, 1.1, 1.2, 1.3] {
            cross.update(&close(p));
            assert_eq!(cross.state(), Signal::None);
        }
        assert!(!cross.seen_enough_data());
        assert_eq!(cross.amount_of_data_still_missing(), 1);
    }
}
