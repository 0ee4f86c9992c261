// =============================================================================
// Notifications — operator alerts for caught trading failures
// =============================================================================

use tracing::error;

/// Delivers an alert to whoever operates the bot.
///
/// Delivery itself must never fail the caller; implementations log and
/// swallow their own transport errors.
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, body: &str);
}

/// Default notifier: writes the alert to the log at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) {
        error!(subject, body, "operator notification");
    }
}
