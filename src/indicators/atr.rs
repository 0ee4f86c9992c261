// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method, streaming form
// =============================================================================
//
// True Range (TR) for each candle:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_0   = SMA of first `period` TR values
//   ATR_t   = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// The first candle only provides `prevClose`, so the value becomes available
// after `period + 1` candles.  Ticks are ignored.
// =============================================================================

use super::Indicator;
use crate::market_data::Candle;
use crate::types::DataPoint;

#[derive(Debug, Clone)]
pub struct AverageTrueRange {
    period: usize,
    prev_close: Option<f64>,
    /// TR values collected while seeding.
    seed: Vec<f64>,
    value: Option<f64>,
}

impl AverageTrueRange {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            prev_close: None,
            seed: Vec::with_capacity(period),
            value: None,
        }
    }

    /// Latest ATR, `None` until seeded.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    fn update_candle(&mut self, candle: &Candle) {
        let valid = [candle.high, candle.low, candle.close]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
            && candle.high >= candle.low;
        if !valid {
            return;
        }

        let Some(prev_close) = self.prev_close.replace(candle.close) else {
            return;
        };

        let tr = (candle.high - candle.low)
            .max((candle.high - prev_close).abs())
            .max((candle.low - prev_close).abs());

        match self.value {
            Some(atr) => {
                let period_f = self.period as f64;
                let next = (atr * (period_f - 1.0) + tr) / period_f;
                if next.is_finite() {
                    self.value = Some(next);
                }
            }
            None => {
                self.seed.push(tr);
                if self.seed.len() == self.period {
                    let sma = self.seed.iter().sum::<f64>() / self.period as f64;
                    if sma.is_finite() {
                        self.value = Some(sma);
                    }
                    self.seed.clear();
                }
            }
        }
    }
}

impl Indicator for AverageTrueRange {
    fn update(&mut self, datapoint: &DataPoint) {
        if let DataPoint::Candle(candle) = datapoint {
            self.update_candle(candle);
        }
    }

    fn seen_enough_data(&self) -> bool {
        self.value.is_some()
    }

    fn amount_of_data_still_missing(&self) -> usize {
        if self.value.is_some() {
            return 0;
        }
        let seen = self.seed.len() + usize::from(self.prev_close.is_some());
        (self.period + 1).saturating_sub(seen)
    }
}
