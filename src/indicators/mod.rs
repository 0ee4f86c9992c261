// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Streaming indicators fed one datapoint (tick or closed candle) at a time.
// Every indicator, the candle aggregator and the exit rules share the
// `Indicator` capability so the strategy can warm them up and query their
// readiness uniformly.

pub mod atr;
pub mod ma_cross;
pub mod moving_average;

use crate::types::DataPoint;

/// Shared capability of everything in the indicator pipeline.
pub trait Indicator {
    /// Feed the next datapoint.  Degenerate input is absorbed locally: the
    /// indicator ignores it or keeps its previous value.
    fn update(&mut self, datapoint: &DataPoint);

    /// True once enough data has been seen for the output to be meaningful.
    fn seen_enough_data(&self) -> bool;

    /// How many more datapoints are needed before `seen_enough_data()`.
    fn amount_of_data_still_missing(&self) -> usize;
}
