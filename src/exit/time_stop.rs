// =============================================================================
// Time Stop — flatten before the weekend market closure
// =============================================================================
//
// Forex closes Friday evening and reopens Sunday evening (UTC).  Inside the
// halt window the time stop reports `StopLong` ("flatten everything"),
// regardless of price.  Outside it reports `None`.
//
// Halt window:
//   Friday   at/after cutoff_hour
//   Saturday all day
//   Sunday   before reopen_hour
// =============================================================================

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use crate::indicators::Indicator;
use crate::types::{DataPoint, Signal};

#[derive(Debug, Clone)]
pub struct TimeStop {
    enabled: bool,
    cutoff_hour: u32,
    reopen_hour: u32,
    state: Signal,
}

impl TimeStop {
    pub fn new(cutoff_hour: u32, reopen_hour: u32) -> Self {
        Self {
            enabled: true,
            cutoff_hour,
            reopen_hour,
            state: Signal::None,
        }
    }

    /// A time stop that never fires.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(24, 0)
        }
    }

    pub fn state(&self) -> Signal {
        self.state
    }

    /// Whether `timestamp` (unix seconds) falls inside the halt window.
    pub fn is_halted(&self, timestamp: f64) -> bool {
        if !self.enabled || !timestamp.is_finite() {
            return false;
        }
        let secs = timestamp.floor() as i64;
        let Some(at) = DateTime::<Utc>::from_timestamp(secs, 0) else {
            return false;
        };

        match at.weekday() {
            Weekday::Fri => at.hour() >= self.cutoff_hour,
            Weekday::Sat => true,
            Weekday::Sun => at.hour() < self.reopen_hour,
            _ => false,
        }
    }
}

impl Indicator for TimeStop {
    fn update(&mut self, datapoint: &DataPoint) {
        self.state = if self.is_halted(datapoint.timestamp()) {
            Signal::StopLong
        } else {
            Signal::None
        };
    }

    fn seen_enough_data(&self) -> bool {
        true
    }

    fn amount_of_data_still_missing(&self) -> usize {
        0
    }
}
