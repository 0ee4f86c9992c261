// =============================================================================
// Risk Manager — converts account risk into an order size
// =============================================================================
//
//   units = floor(net_worth * risk_percent / 100 * leverage / price)
//
// clamped to [0, available_units].  Net worth, leverage and the available
// ceiling are read from the exchange at call time and never cached.
//
// Fail-safe: any account query failure, a non-positive price, or a
// non-finite intermediate yields 0 units, which the strategy treats as
// "do not trade".
// =============================================================================

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::exchange::Exchange;
use crate::types::Side;

pub struct RiskManager {
    exchange: Arc<dyn Exchange>,
    /// Percentage of net worth put at risk per trade (e.g. 2.0 = 2 %).
    risk_percent: f64,
}

impl RiskManager {
    pub fn new(exchange: Arc<dyn Exchange>, risk_percent: f64) -> Self {
        Self {
            exchange,
            risk_percent,
        }
    }

    /// Units to buy when entering long at `current_price`.
    pub fn long_position_size(&self, current_price: f64) -> u64 {
        self.position_size(Side::Long, current_price)
    }

    /// Units to sell when entering short at `current_price`.
    pub fn short_position_size(&self, current_price: f64) -> u64 {
        self.position_size(Side::Short, current_price)
    }

    fn position_size(&self, side: Side, current_price: f64) -> u64 {
        if !current_price.is_finite() || current_price <= 0.0 {
            debug!(%side, current_price, "no usable price, sizing to 0");
            return 0;
        }

        match self.try_position_size(current_price) {
            Ok(units) => {
                debug!(%side, units, current_price, "position sized");
                units
            }
            Err(e) => {
                warn!(%side, error = %e, "account query failed, sizing to 0");
                0
            }
        }
    }

    fn try_position_size(&self, current_price: f64) -> Result<u64> {
        let net_worth = self.exchange.get_net_worth()?;
        let leverage = self.exchange.get_leverage()?;
        let available = self.exchange.available_units()?;
        Ok(size_units(
            net_worth,
            self.risk_percent,
            leverage,
            current_price,
            available,
        ))
    }
}

/// Pure sizing formula, clamped to `[0, available]`.
pub fn size_units(
    net_worth: f64,
    risk_percent: f64,
    leverage: f64,
    price: f64,
    available: u64,
) -> u64 {
    if price <= 0.0 || !price.is_finite() {
        return 0;
    }
    let raw = (net_worth * risk_percent / 100.0 * leverage / price).floor();
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    (raw as u64).min(available)
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("exchange", &"<Exchange>")
            .field("risk_percent", &self.risk_percent)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::testing::MockExchange;

    fn manager(risk: f64) -> (Arc<MockExchange>, RiskManager) {
        let ex = Arc::new(MockExchange::new());
        let rm = RiskManager::new(ex.clone(), risk);
        (ex, rm)
    }

    #[test]
    fn sizes_from_net_worth_and_leverage() {
        let (_ex, rm) = manager(2.0);
        // 10_000 * 0.02 * 20 / 1.25 = 3200
        assert_eq!(rm.long_position_size(1.25), 3200);
        assert_eq!(rm.short_position_size(1.25), 3200);
    }

    #[test]
    fn clamped_to_available_units() {
        let (ex, rm) = manager(2.0);
        ex.state.lock().available = 1000;
        assert_eq!(rm.long_position_size(1.25), 1000);
    }

    #[test]
    fn zero_price_means_no_trade() {
        for risk in [0.5, 2.0, 50.0] {
            for leverage in [1.0, 20.0, 50.0] {
                let (ex, rm) = manager(risk);
                ex.state.lock().leverage = leverage;
                assert_eq!(rm.long_position_size(0.0), 0);
                assert_eq!(rm.short_position_size(0.0), 0);
            }
        }
    }

    #[test]
    fn account_failure_means_no_trade() {
        let (ex, rm) = manager(2.0);
        ex.state.lock().fail_account = true;
        assert_eq!(rm.long_position_size(1.1), 0);
        assert_eq!(rm.short_position_size(1.1), 0);
    }

    #[test]
    fn negative_net_worth_clamps_to_zero() {
        let (ex, rm) = manager(2.0);
        ex.state.lock().net_worth = -500.0;
        assert_eq!(rm.long_position_size(1.1), 0);
    }

    #[test]
    fn size_units_floors() {
        // 1000 * 0.01 * 10 / 3 = 33.33
        assert_eq!(size_units(1000.0, 1.0, 10.0, 3.0, u64::MAX), 33);
        assert_eq!(size_units(1000.0, 1.0, 10.0, f64::NAN, u64::MAX), 0);
        assert_eq!(size_units(0.0, 1.0, 10.0, 3.0, u64::MAX), 0);
    }
}
