// =============================================================================
// Ticker — the single consumer loop
// =============================================================================
//
// Owns the receiving end of the price queue, the watchdog, and the list of
// subscribed observers.  Each pull is handed to every observer in
// subscription order and fully processed before the next pull, so the core
// never sees two prices concurrently.
// =============================================================================

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{FeedError, FeedMessage, TickObserver, Watchdog};
use crate::types::DataPoint;

pub struct Ticker {
    rx: mpsc::Receiver<FeedMessage>,
    watchdog: Watchdog,
    poll_interval: Duration,
    observers: Vec<Box<dyn TickObserver>>,
    ticks: u64,
}

impl Ticker {
    pub fn new(rx: mpsc::Receiver<FeedMessage>, watchdog: Watchdog, poll_interval: Duration) -> Self {
        Self {
            rx,
            watchdog,
            poll_interval,
            observers: Vec::new(),
            ticks: 0,
        }
    }

    /// Register an observer.  Observers are updated in the order subscribed.
    pub fn subscribe(&mut self, observer: impl TickObserver + 'static) {
        self.observers.push(Box::new(observer));
        debug!(subscribers = self.observers.len(), "ticker subscriber added");
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    /// Price ticks delivered so far (heartbeats excluded).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Pull at most one message and push it to every observer.
    ///
    /// `Ok(true)` when a message was consumed, `Ok(false)` when the poll
    /// timed out with nothing available.
    pub async fn update_subscribers(&mut self) -> Result<bool, FeedError> {
        if self.watchdog.is_expired() {
            return Err(FeedError::StaleFeed {
                timeout_secs: self.watchdog.timeout_secs(),
            });
        }

        let msg = match tokio::time::timeout(self.poll_interval, self.rx.recv()).await {
            Err(_) => return Ok(false),
            Ok(None) => return Err(FeedError::Closed),
            Ok(Some(msg)) => msg,
        };

        self.watchdog.reset();
        if let FeedMessage::Price(tick) = msg {
            let datapoint = DataPoint::Tick(tick);
            for observer in self.observers.iter_mut() {
                observer.update(&datapoint);
            }
            self.ticks += 1;
        }
        Ok(true)
    }

    /// Drive observers until the feed closes (`Ok`) or goes stale (`Err`).
    pub async fn run(&mut self) -> Result<u64, FeedError> {
        info!(subscribers = self.subscriber_count(), "ticker running");
        let result = loop {
            match self.update_subscribers().await {
                Ok(_) => {}
                Err(FeedError::Closed) => break Ok(self.ticks),
                Err(e) => break Err(e),
            }
        };
        self.shutdown();
        info!(ticks = self.ticks, "ticker finished");
        result
    }

    /// Stop the watchdog and refuse further messages.
    pub fn shutdown(&mut self) {
        self.watchdog.stop();
        self.rx.close();
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("subscribers", &self.observers.len())
            .field("ticks", &self.ticks)
            .field("watchdog", &self.watchdog)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::feed::channel;
    use crate::types::Tick;

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        log: Option<Arc<Mutex<Vec<(&'static str, f64)>>>>,
        prices: Vec<f64>,
    }

    impl TickObserver for Recorder {
        fn update(&mut self, datapoint: &DataPoint) {
            self.prices.push(datapoint.price());
            if let Some(log) = &self.log {
                log.lock().push((self.name, datapoint.price()));
            }
        }
    }

    fn ticker(rx: mpsc::Receiver<FeedMessage>, timeout_ms: u64) -> Ticker {
        Ticker::new(
            rx,
            Watchdog::start(Duration::from_millis(timeout_ms)),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn delivers_ticks_in_subscription_order() {
        let (tx, rx) = channel(8);
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ticker = ticker(rx, 5_000);
        ticker.subscribe(Recorder {
            name: "exchange",
            log: Some(log.clone()),
            ..Default::default()
        });
        ticker.subscribe(Recorder {
            name: "strategy",
            log: Some(log.clone()),
            ..Default::default()
        });

        tx.send(FeedMessage::Price(Tick::new(1.0, 1.1))).await.unwrap();
        tx.send(FeedMessage::Heartbeat).await.unwrap();
        tx.send(FeedMessage::Price(Tick::new(2.0, 1.2))).await.unwrap();
        drop(tx);

        assert_eq!(ticker.run().await, Ok(2));
        let log = log.lock();
        assert_eq!(
            *log,
            vec![
                ("exchange", 1.1),
                ("strategy", 1.1),
                ("exchange", 1.2),
                ("strategy", 1.2)
            ]
        );
    }

    #[tokio::test]
    async fn poll_times_out_without_data() {
        let (_tx, rx) = channel(8);
        let mut ticker = ticker(rx, 5_000);
        assert_eq!(ticker.update_subscribers().await, Ok(false));
    }

    #[tokio::test]
    async fn closed_feed_reported() {
        let (tx, rx) = channel(8);
        drop(tx);
        let mut ticker = ticker(rx, 5_000);
        assert_eq!(ticker.update_subscribers().await, Err(FeedError::Closed));
    }

    #[tokio::test]
    async fn silent_feed_goes_stale() {
        let (_tx, rx) = channel(8);
        let shared = Arc::new(Mutex::new(Recorder::default()));
        let mut ticker = ticker(rx, 50);
        ticker.subscribe(shared.clone());

        let result = tokio::time::timeout(Duration::from_secs(5), ticker.run()).await;
        assert_eq!(result.ok(), Some(Err(FeedError::StaleFeed { timeout_secs: 1 })));
        assert!(shared.lock().prices.is_empty());
    }

    #[tokio::test]
    async fn sub_second_stale_message_never_reads_zero() {
        let (_tx, rx) = channel(8);
        let mut ticker = ticker(rx, 50);
        assert_eq!(ticker.subscriber_count(), 0);

        let err = tokio::time::timeout(Duration::from_secs(5), ticker.run())
            .await
            .unwrap()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("for 1s"), "{msg}");
        assert!(!msg.contains("for 0s"), "{msg}");
    }

    #[tokio::test]
    async fn heartbeats_keep_feed_alive() {
        let (tx, rx) = channel(8);
        let mut ticker = ticker(rx, 100);
        let producer = tokio::spawn(async move {
            for _ in 0..8 {
                tokio::time::sleep(Duration::from_millis(30)).await;
                if tx.send(FeedMessage::Heartbeat).await.is_err() {
                    break;
                }
            }
        });

        assert_eq!(ticker.run().await, Ok(0));
        producer.await.unwrap();
    }
}
