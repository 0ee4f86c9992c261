// =============================================================================
// Moving Averages — Simple (SMA) and Exponential (EMA), streaming form
// =============================================================================
//
// SMA: arithmetic mean of the last `period` prices, kept in a ring buffer.
//      Reads 0.0 until `period` prices have been seen.
//
// EMA:
//   multiplier = 2 / (period + 1)
//   EMA_t      = price_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The EMA is seeded with the very first price and is defined from then on,
// but it only reports `seen_enough_data()` after `period` prices so readiness
// checks treat both variants alike.
//
// Both consume the tick price or the candle close.  Non-finite and
// non-positive prices are skipped.
// =============================================================================

use std::collections::VecDeque;

use super::Indicator;
use crate::types::DataPoint;

/// A streaming moving average over prices.
pub trait MovingAverage: Indicator + Send {
    /// Current value of the average.
    fn value(&self) -> f64;
}

fn usable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

// ---------------------------------------------------------------------------
// Simple moving average
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    window: VecDeque<f64>,
    seen_count: usize,
    value: f64,
}

impl SimpleMovingAverage {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            seen_count: 0,
            value: 0.0,
        }
    }
}

impl Indicator for SimpleMovingAverage {
    fn update(&mut self, datapoint: &DataPoint) {
        let price = datapoint.price();
        if !usable(price) {
            return;
        }

        self.window.push_back(price);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        self.seen_count = (self.seen_count + 1).min(self.period);

        if self.seen_count >= self.period {
            self.value = self.window.iter().sum::<f64>() / self.period as f64;
        }
    }

    fn seen_enough_data(&self) -> bool {
        self.seen_count >= self.period
    }

    fn amount_of_data_still_missing(&self) -> usize {
        self.period.saturating_sub(self.seen_count)
    }
}

impl MovingAverage for SimpleMovingAverage {
    fn value(&self) -> f64 {
        self.value
    }
}

// ---------------------------------------------------------------------------
// Exponential moving average
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    period: usize,
    multiplier: f64,
    seen_count: usize,
    value: f64,
}

impl ExponentialMovingAverage {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            seen_count: 0,
            value: 0.0,
        }
    }
}

impl Indicator for ExponentialMovingAverage {
    fn update(&mut self, datapoint: &DataPoint) {
        let price = datapoint.price();
        if !usable(price) {
            return;
        }

        let next = if self.seen_count == 0 {
            price
        } else {
            price * self.multiplier + self.value * (1.0 - self.multiplier)
        };
        if !next.is_finite() {
            return;
        }

        self.value = next;
        self.seen_count = (self.seen_count + 1).min(self.period);
    }

    fn seen_enough_data(&self) -> bool {
        self.seen_count >= self.period
    }

    fn amount_of_data_still_missing(&self) -> usize {
        self.period.saturating_sub(self.seen_count)
    }
}

impl MovingAverage for ExponentialMovingAverage {
    fn value(&self) -> f64 {
        self.value
    }
}
