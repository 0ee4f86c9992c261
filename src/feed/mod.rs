// =============================================================================
// Feed boundary — bounded queue between price producers and the core
// =============================================================================
//
// Producers (replay task, live stream adapter) push `FeedMessage`s into a
// bounded tokio mpsc channel.  A single consumer loop (`Ticker`) pulls them
// with a short timeout and synchronously drives every subscribed observer
// before pulling the next one.  A watchdog flags the feed as stale when
// nothing arrives within the configured timeout.
// =============================================================================

pub mod ticker;
pub mod watchdog;

pub use ticker::Ticker;
pub use watchdog::Watchdog;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{DataPoint, Tick};

/// One item on the price queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedMessage {
    Price(Tick),
    /// Keep-alive from the producer; resets the watchdog, carries no price.
    Heartbeat,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("no price data received for {timeout_secs}s, feed is stale")]
    StaleFeed { timeout_secs: u64 },
    #[error("price feed closed")]
    Closed,
}

pub fn channel(capacity: usize) -> (mpsc::Sender<FeedMessage>, mpsc::Receiver<FeedMessage>) {
    mpsc::channel(capacity.max(1))
}

// ---------------------------------------------------------------------------
// Observer capability
// ---------------------------------------------------------------------------

/// Anything that wants price pushes from the ticker.
///
/// The price accessors exist for display collaborators; observers that do
/// not track exit levels keep the 0.0 defaults.
pub trait TickObserver: Send {
    fn update(&mut self, datapoint: &DataPoint);

    fn stop_loss_price(&self) -> f64 {
        0.0
    }

    fn trailing_stop_price(&self) -> f64 {
        0.0
    }

    fn take_profit_price(&self) -> f64 {
        0.0
    }
}

/// Lets an observer be shared between the ticker and its owner.
impl<T: TickObserver> TickObserver for Arc<Mutex<T>> {
    fn update(&mut self, datapoint: &DataPoint) {
        self.lock().update(datapoint);
    }

    fn stop_loss_price(&self) -> f64 {
        self.lock().stop_loss_price()
    }

    fn trailing_stop_price(&self) -> f64 {
        self.lock().trailing_stop_price()
    }

    fn take_profit_price(&self) -> f64 {
        self.lock().take_profit_price()
    }
}
