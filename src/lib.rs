//! Generic retry executor.
//!
//! Repeatedly invokes a fallible operation until it succeeds, a
//! non-retryable error is seen, or the attempt budget is exhausted.
//!
//! ```
//! use std::time::Duration;
//!
//! let mut calls = 0;
//! let result = retryable::retry_with_non_retryable_errors(
//!     || {
//!         calls += 1;
//!         if calls < 2 { Err("temporary error") } else { Ok(calls) }
//!     },
//!     3,
//!     Duration::from_millis(1),
//!     &["fatal", "permanent"],
//! );
//! assert_eq!(result, Ok(2));
//! ```

pub mod cancel;
pub mod classifier;
pub mod config;
pub mod executor;
pub mod logging;

pub use cancel::{CancellationToken, RetryError};
pub use classifier::{AllowList, Always, Classifier, DenyList, contains_error_message};
pub use config::{
    DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS, GlobalDefaults, RetryConfig, RetrySettings,
    default_delay, default_max_attempts, reset_defaults, set_default_delay,
    set_default_max_attempts,
};
pub use executor::{
    Retrier, retry_always, retry_default, retry_default_with_custom_check,
    retry_with_custom_check, retry_with_non_retryable_errors, retry_with_retryable_errors,
};
pub use logging::{
    LogSink, RetryEvent, RetryLogger, logging_sink, reset_logging_sink, set_logging_sink,
};
