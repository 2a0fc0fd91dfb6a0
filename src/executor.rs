//! The retry loop.
//!
//! [`Retrier`] bundles an attempt budget, a [`Classifier`] and an optional
//! [`RetryLogger`]. For `attempt = 1..=max_attempts` it invokes the
//! operation and:
//!
//! - returns the value on success, without consulting the classifier
//! - returns the error immediately if the classifier rejects it
//! - otherwise logs the failure, pauses for `delay` and tries again
//!
//! The log and pause also happen after the last retryable failure; the loop
//! bound, not an early return, ends the sequence. Once the budget is spent
//! the error of the final attempt is returned as-is.

use log::{debug, trace};
use std::fmt::Display;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cancel::{CancellationToken, RetryError};
use crate::classifier::{AllowList, Always, Classifier, DenyList};
use crate::config::{GlobalDefaults, RetryConfig, RetrySettings};
use crate::logging::{RetryEvent, RetryLogger, logging_sink};

/// Retry executor.
///
/// ```
/// use retryable::{AllowList, Retrier, RetryConfig};
/// use std::time::Duration;
///
/// let mut calls = 0;
/// let result = Retrier::new(RetryConfig::new(5, Duration::from_millis(1)))
///     .classifier(AllowList::new(["temporary"]))
///     .run(|| {
///         calls += 1;
///         if calls < 3 { Err("temporary error") } else { Ok(42) }
///     });
///
/// assert_eq!(result, Ok(42));
/// assert_eq!(calls, 3);
/// ```
pub struct Retrier<C = Always, S = RetryConfig> {
    settings: S,
    classifier: C,
    logger: Option<Arc<dyn RetryLogger>>,
}

impl Retrier {
    /// Executor with a fixed budget that retries every error.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            settings: config,
            classifier: Always,
            logger: None,
        }
    }
}

impl Retrier<Always, GlobalDefaults> {
    /// Executor driven by the process-wide defaults, re-read on every iteration.
    pub fn with_defaults() -> Self {
        Self {
            settings: GlobalDefaults,
            classifier: Always,
            logger: None,
        }
    }
}

impl<C, S: RetrySettings> Retrier<C, S> {
    /// Replaces the classifier.
    pub fn classifier<C2>(self, classifier: C2) -> Retrier<C2, S> {
        Retrier {
            settings: self.settings,
            classifier,
            logger: self.logger,
        }
    }

    /// Sends retry notifications to `logger` instead of the process-wide sink.
    pub fn logger(mut self, logger: Arc<dyn RetryLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The attempt budget and delay this executor consults.
    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is exhausted. Blocks the calling thread while pausing.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            max_attempts = self.settings.max_attempts(),
            classifier = <C as Classifier<E>>::kind(&self.classifier),
        )
    )]
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
        C: Classifier<E>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation() {
                Ok(value) => {
                    trace!("Attempt {} succeeded", attempt);
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !self.should_retry(attempt, &error) {
                return Err(error);
            }
            thread::sleep(self.notify(attempt, &error));

            if attempt >= self.settings.max_attempts() {
                return Err(error);
            }
            attempt += 1;
        }
    }

    /// Like [`run`](Self::run), but stops early once `token` is cancelled.
    ///
    /// The token is checked before every invocation and before every pause.
    /// A sequence stopped by the token emits no retry notification for its
    /// last failure. Invocations and pauses already in progress are not interrupted.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            max_attempts = self.settings.max_attempts(),
            classifier = <C as Classifier<E>>::kind(&self.classifier),
        )
    )]
    pub fn run_with_cancel<T, E, F>(
        &self,
        mut operation: F,
        token: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
        C: Classifier<E>,
    {
        let mut attempt = 0;
        let mut last_error = None;
        loop {
            if token.is_cancelled() {
                debug!("Cancelled before attempt {}", attempt + 1);
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    last_error,
                });
            }
            attempt += 1;

            let error = match operation() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.should_retry(attempt, &error) {
                return Err(RetryError::Operation(error));
            }
            if token.is_cancelled() {
                debug!("Cancelled after attempt {}", attempt);
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    last_error: Some(error),
                });
            }
            thread::sleep(self.notify(attempt, &error));

            if attempt >= self.settings.max_attempts() {
                return Err(RetryError::Operation(error));
            }
            last_error = Some(error);
        }
    }

    /// Async counterpart of [`run`](Self::run); pauses with `tokio::time::sleep`.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            max_attempts = self.settings.max_attempts(),
            classifier = <C as Classifier<E>>::kind(&self.classifier),
        )
    )]
    pub async fn run_async<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        C: Classifier<E>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.should_retry(attempt, &error) {
                return Err(error);
            }
            tokio::time::sleep(self.notify(attempt, &error)).await;

            if attempt >= self.settings.max_attempts() {
                return Err(error);
            }
            attempt += 1;
        }
    }

    /// Async counterpart of [`run_with_cancel`](Self::run_with_cancel).
    ///
    /// Besides the checks before each invocation and each pause, a token
    /// cancelled during a pause cuts the pause short.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            max_attempts = self.settings.max_attempts(),
            classifier = <C as Classifier<E>>::kind(&self.classifier),
        )
    )]
    pub async fn run_async_with_cancel<T, E, F, Fut>(
        &self,
        mut operation: F,
        token: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        C: Classifier<E>,
    {
        let mut attempt = 0;
        let mut last_error = None;
        loop {
            if token.is_cancelled() {
                debug!("Cancelled before attempt {}", attempt + 1);
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    last_error,
                });
            }
            attempt += 1;

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.should_retry(attempt, &error) {
                return Err(RetryError::Operation(error));
            }
            if token.is_cancelled() {
                debug!("Cancelled after attempt {}", attempt);
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    last_error: Some(error),
                });
            }

            let delay = self.notify(attempt, &error);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => {
                    debug!("Cancelled while pausing after attempt {}", attempt);
                    return Err(RetryError::Cancelled {
                        attempts: attempt,
                        last_error: Some(error),
                    });
                }
            }

            if attempt >= self.settings.max_attempts() {
                return Err(RetryError::Operation(error));
            }
            last_error = Some(error);
        }
    }

    fn should_retry<E>(&self, attempt: u32, error: &E) -> bool
    where
        E: Display,
        C: Classifier<E>,
    {
        let retryable = self.classifier.is_retryable(error);
        if !retryable {
            debug!("Attempt {}: non-retryable error: {}", attempt, error);
        }
        retryable
    }

    /// Reports a retried attempt to the logger and returns the pause before the next one.
    fn notify<E: Display>(&self, attempt: u32, error: &E) -> Duration {
        let event = RetryEvent {
            attempt,
            max_attempts: self.settings.max_attempts(),
            error: error.to_string(),
            delay: self.settings.delay(),
        };
        match &self.logger {
            Some(logger) => logger.on_retry(&event),
            None => logging_sink().on_retry(&event),
        }
        event.delay
    }
}

/// Retries with the process-wide defaults, treating every error as retryable.
pub fn retry_default<T, E, F>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    Retrier::with_defaults().run(operation)
}

/// Retries with the process-wide defaults while `is_retryable` approves the error.
pub fn retry_default_with_custom_check<T, E, F, P>(operation: F, is_retryable: P) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
    P: Fn(&E) -> bool,
{
    Retrier::with_defaults()
        .classifier(is_retryable)
        .run(operation)
}

/// Retries up to `max_attempts` times while `is_retryable` approves the error.
pub fn retry_with_custom_check<T, E, F, P>(
    operation: F,
    max_attempts: u32,
    delay: Duration,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
    P: Fn(&E) -> bool,
{
    Retrier::new(RetryConfig::new(max_attempts, delay))
        .classifier(is_retryable)
        .run(operation)
}

/// Retries unless the error message contains one of `non_retryable`.
pub fn retry_with_non_retryable_errors<T, E, F, P>(
    operation: F,
    max_attempts: u32,
    delay: Duration,
    non_retryable: &[P],
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
    P: AsRef<str>,
{
    Retrier::new(RetryConfig::new(max_attempts, delay))
        .classifier(DenyList::new(non_retryable.iter().map(AsRef::<str>::as_ref)))
        .run(operation)
}

/// Retries only while the error message contains one of `retryable`.
pub fn retry_with_retryable_errors<T, E, F, P>(
    operation: F,
    max_attempts: u32,
    delay: Duration,
    retryable: &[P],
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
    P: AsRef<str>,
{
    Retrier::new(RetryConfig::new(max_attempts, delay))
        .classifier(AllowList::new(retryable.iter().map(AsRef::<str>::as_ref)))
        .run(operation)
}

/// Retries every error up to `max_attempts` times.
pub fn retry_always<T, E, F>(operation: F, max_attempts: u32, delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    Retrier::new(RetryConfig::new(max_attempts, delay)).run(operation)
}
