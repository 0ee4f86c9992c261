// =============================================================================
// Exchange capability
// =============================================================================
//
// Everything the strategy needs from a broker, live or simulated.  Account
// and position state is owned by the implementation and read through on
// every call; the strategy never caches it across updates.
//
// Every method is fallible.  Callers decide how to absorb failures: the
// strategy converts order failures into notifications and the risk manager
// treats account-query failures as "do not trade".

pub mod paper;

pub use paper::PaperExchange;

use anyhow::Result;

use crate::market_data::Candle;
use crate::types::{CloseTarget, Side};

pub trait Exchange: Send + Sync {
    /// Begin pushing prices into the feed.
    fn start_price_streaming(&self) -> Result<()>;

    /// Stop pushing prices; the feed ends once drained.
    fn stop_price_streaming(&self);

    /// The last `count` closed candles of `size_minutes`, oldest first.
    fn get_candles(&self, count: usize, size_minutes: u32) -> Result<Vec<Candle>>;

    /// Signed units held: positive long, negative short, 0 flat.
    fn current_position(&self) -> Result<i64>;

    fn current_side(&self) -> Result<Side>;

    /// Ceiling on the units a new order may request.
    fn available_units(&self) -> Result<u64>;

    fn get_net_worth(&self) -> Result<f64>;

    fn get_leverage(&self) -> Result<f64>;

    fn buy(&self, units: u64) -> Result<()>;

    fn sell(&self, units: u64) -> Result<()>;

    /// Close the given side(s).  Closing when flat is a no-op.
    fn close_position(&self, target: CloseTarget) -> Result<()>;
}
