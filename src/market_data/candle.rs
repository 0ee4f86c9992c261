// =============================================================================
// Candle — OHLC aggregation of ticks over a fixed time window
// =============================================================================
//
// A candle covers the closed interval [open_time, close_time].  Ticks inside
// the window are folded into open/high/low/close; the first accepted tick sets
// all four.  The candle closes the first time it sees a tick stamped at or
// after close_time, and that tick is still folded in when it lands exactly on
// close_time.  Once closed the candle is immutable.
// =============================================================================

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::indicators::Indicator;
use crate::types::{DataPoint, Tick};

/// A single OHLC candle, either built live from ticks or fetched closed from
/// the exchange history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: f64,
    pub close_time: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub is_closed: bool,
    /// Number of ticks folded into OHLC so far.
    #[serde(default)]
    ticks: u32,
}

impl Candle {
    /// Open an empty candle for the window `[open_time, close_time]`.
    ///
    /// A window with `close_time <= open_time` could never close, so it is
    /// rejected here instead of producing a candle that hangs forever.
    pub fn new(open_time: f64, close_time: f64) -> Result<Self> {
        ensure!(
            open_time.is_finite() && close_time.is_finite(),
            "candle window must be finite (open={open_time}, close={close_time})"
        );
        ensure!(
            close_time > open_time,
            "candle close_time {close_time} must be after open_time {open_time}"
        );

        Ok(Self {
            open_time,
            close_time,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            is_closed: false,
            ticks: 0,
        })
    }

    /// Build an already-closed candle from historical OHLC values.
    pub fn closed(
        open_time: f64,
        close_time: f64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self> {
        let mut candle = Self::new(open_time, close_time)?;
        candle.open = open;
        candle.high = high;
        candle.low = low;
        candle.close = close;
        candle.ticks = 1;
        candle.is_closed = true;
        Ok(candle)
    }

    /// Fold a tick into the candle.
    ///
    /// Ticks outside the window are ignored, as are ticks with a non-finite
    /// timestamp.  A non-positive or non-finite price still closes the candle
    /// when it is late enough, but is never folded into OHLC.
    pub fn update_tick(&mut self, tick: &Tick) {
        if self.is_closed || !tick.timestamp.is_finite() {
            return;
        }

        if tick.timestamp >= self.close_time {
            self.is_closed = true;
        }

        let in_window = tick.timestamp >= self.open_time && tick.timestamp <= self.close_time;
        if !in_window || !tick.price.is_finite() || tick.price <= 0.0 {
            return;
        }

        if self.ticks == 0 {
            self.open = tick.price;
            self.high = tick.price;
            self.low = tick.price;
        } else {
            self.high = self.high.max(tick.price);
            self.low = self.low.min(tick.price);
        }
        self.close = tick.price;
        self.ticks += 1;
    }

    /// Whether any price has been folded in yet.
    pub fn has_data(&self) -> bool {
        self.ticks > 0
    }
}

impl Indicator for Candle {
    fn update(&mut self, datapoint: &DataPoint) {
        if let DataPoint::Tick(tick) = datapoint {
            self.update_tick(tick);
        }
    }

    fn seen_enough_data(&self) -> bool {
        self.is_closed
    }

    /// Readiness gate rather than a countdown: 0 once closed, 1 otherwise.
    fn amount_of_data_still_missing(&self) -> usize {
        if self.is_closed {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for Candle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.3}..{:.3}] o={} h={} l={} c={}{}",
            self.open_time,
            self.close_time,
            self.open,
            self.high,
            self.low,
            self.close,
            if self.is_closed { " (closed)" } else { "" }
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
