use log::{error, info};
use std::sync::Arc;

/// Receives the poller's reactions.
///
/// `navigate` and `alert` are each called at most once per poller, and
/// never both.
pub trait ProgressSink: Send + Sync + 'static {
    /// New value for the progress indicator
    fn progress(&self, percentage: u8);

    /// Analysis finished; move to `target`
    fn navigate(&self, target: &str);

    /// Analysis failed; show `message` to the user
    fn alert(&self, message: &str);
}

impl<T: ProgressSink> ProgressSink for Arc<T> {
    fn progress(&self, percentage: u8) {
        (**self).progress(percentage)
    }

    fn navigate(&self, target: &str) {
        (**self).navigate(target)
    }

    fn alert(&self, message: &str) {
        (**self).alert(message)
    }
}

/// Sink that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn progress(&self, percentage: u8) {
        info!("progress {}%", percentage);
    }

    fn navigate(&self, target: &str) {
        info!("analysis complete, redirecting to {}", target);
    }

    fn alert(&self, message: &str) {
        error!("analysis failed: {}", message);
    }
}
