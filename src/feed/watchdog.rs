// =============================================================================
// Watchdog — liveness timer for the price feed
// =============================================================================
//
// A background task sleeps until a deadline.  Every `reset()` pushes a new
// deadline through a watch channel, restarting the sleep.  If the deadline
// passes untouched the task raises the `expired` flag and exits; the consumer
// loop checks the flag before each pull and treats it as a dead feed.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

pub struct Watchdog {
    timeout: Duration,
    deadline: watch::Sender<Instant>,
    expired: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Arm a watchdog that expires `timeout` from now unless reset.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(timeout: Duration) -> Self {
        let (deadline, rx) = watch::channel(Instant::now() + timeout);
        let expired = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_timer(rx, expired.clone(), timeout));
        debug!(timeout_secs = timeout.as_secs_f64(), "watchdog armed");
        Self {
            timeout,
            deadline,
            expired,
            task: Some(task),
        }
    }

    /// Push the deadline out by a full timeout from now.
    pub fn reset(&self) {
        // Only fails once the timer task has exited, i.e. already expired or stopped.
        let _ = self.deadline.send(Instant::now() + self.timeout);
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Timeout in whole seconds, rounded up so a sub-second timeout never reads 0.
    pub fn timeout_secs(&self) -> u64 {
        whole_secs_ceil(self.timeout)
    }

    /// Cancel the timer task.  An already-raised expiry stays raised.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("watchdog stopped");
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("timeout", &self.timeout)
            .field("expired", &self.is_expired())
            .field("running", &self.task.is_some())
            .finish()
    }
}

fn whole_secs_ceil(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

async fn run_timer(mut deadline: watch::Receiver<Instant>, expired: Arc<AtomicBool>, timeout: Duration) {
    loop {
        let at = *deadline.borrow_and_update();
        tokio::select! {
            _ = tokio::time::sleep_until(at) => {
                expired.store(true, Ordering::SeqCst);
                warn!(timeout_secs = whole_secs_ceil(timeout), "watchdog expired, no feed data");
                return;
            }
            changed = deadline.changed() => {
                if changed.is_err() {
                    // Owner dropped.
                    return;
                }
            }
        }
    }
}
