//! Retry notifications.
//!
//! Every retryable failure produces one [`RetryEvent`], handed to a
//! [`RetryLogger`]. Loggers run synchronously on the retrying thread, so a
//! slow logger delays the next attempt; keeping it fast is the caller's job.

use log::warn;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// One retried attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    /// 1-based number of the attempt that just failed.
    pub attempt: u32,
    pub max_attempts: u32,
    /// Rendered message of the attempt's error.
    pub error: String,
    /// Pause before the next attempt.
    pub delay: Duration,
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Attempt {}/{} failed: {}. Retrying in {:?}...",
            self.attempt, self.max_attempts, self.error, self.delay
        )
    }
}

/// Receives a notification for every retried attempt.
#[cfg_attr(test, mockall::automock)]
pub trait RetryLogger: Send + Sync {
    fn on_retry(&self, event: &RetryEvent);
}

impl<F> RetryLogger for F
where
    F: Fn(&RetryEvent) + Send + Sync,
{
    fn on_retry(&self, event: &RetryEvent) {
        self(event)
    }
}

/// Default logger: writes each event through the `log` facade at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl RetryLogger for LogSink {
    fn on_retry(&self, event: &RetryEvent) {
        warn!("{}", event);
    }
}

static SINK: RwLock<Option<Arc<dyn RetryLogger>>> = RwLock::new(None);

/// Replaces the process-wide logger used by executors without their own.
pub fn set_logging_sink(sink: Arc<dyn RetryLogger>) {
    *SINK.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
}

/// Restores the default [`LogSink`].
pub fn reset_logging_sink() {
    *SINK.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// The current process-wide logger.
pub fn logging_sink() -> Arc<dyn RetryLogger> {
    SINK.read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_else(|| Arc::new(LogSink))
}
