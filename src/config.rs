//! Retry budget configuration.
//!
//! [`RetryConfig`] is a plain value passed to an executor. [`GlobalDefaults`]
//! reads the process-wide defaults instead, so changes made while a retry
//! sequence is running take effect on its next iteration.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Default maximum number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

static GLOBAL_MAX_ATTEMPTS: AtomicU32 = AtomicU32::new(DEFAULT_MAX_ATTEMPTS);
static GLOBAL_DELAY_NANOS: AtomicU64 = AtomicU64::new(DEFAULT_DELAY.as_nanos() as u64);

/// Source of the attempt budget and delay, consulted on every loop iteration.
pub trait RetrySettings {
    fn max_attempts(&self) -> u32;
    fn delay(&self) -> Duration;
}

/// Fixed attempt budget and delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of invocations, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause after each retryable failure.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryConfig {
    /// Budget of `max_attempts` invocations with `delay` between them.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Snapshot of the current process-wide defaults.
    pub fn from_defaults() -> Self {
        Self::new(default_max_attempts(), default_delay())
    }
}

impl RetrySettings for RetryConfig {
    fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

/// Reads the process-wide defaults each time it is asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalDefaults;

impl RetrySettings for GlobalDefaults {
    fn max_attempts(&self) -> u32 {
        default_max_attempts()
    }

    fn delay(&self) -> Duration {
        default_delay()
    }
}

/// Current process-wide maximum number of attempts (at least 1).
pub fn default_max_attempts() -> u32 {
    GLOBAL_MAX_ATTEMPTS.load(Ordering::Relaxed).max(1)
}

/// Overwrites the process-wide maximum number of attempts.
///
/// Intended as a startup-time setting. Retry sequences already running
/// pick the new value up on their next iteration.
pub fn set_default_max_attempts(max_attempts: u32) {
    GLOBAL_MAX_ATTEMPTS.store(max_attempts, Ordering::Relaxed);
}

/// Current process-wide delay between attempts.
pub fn default_delay() -> Duration {
    Duration::from_nanos(GLOBAL_DELAY_NANOS.load(Ordering::Relaxed))
}

/// Overwrites the process-wide delay. Values beyond `u64::MAX` nanoseconds saturate.
pub fn set_default_delay(delay: Duration) {
    let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    GLOBAL_DELAY_NANOS.store(nanos, Ordering::Relaxed);
}

/// Restores the documented defaults (3 attempts, 1 second).
pub fn reset_defaults() {
    set_default_max_attempts(DEFAULT_MAX_ATTEMPTS);
    set_default_delay(DEFAULT_DELAY);
}
