//! Cooperative cancellation for retry sequences.

use std::fmt;

pub use tokio_util::sync::CancellationToken;

/// Outcome of a cancellable retry sequence that did not succeed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed and the sequence stopped normally.
    Operation(E),
    /// The token was cancelled before the sequence finished.
    Cancelled {
        /// Number of invocations that ran.
        attempts: u32,
        /// Error of the last invocation, if any ran.
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Whether the sequence ended because the token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The operation's most recent error, if one was observed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Operation(e) => Some(e),
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Operation(e) => write!(f, "{}", e),
            RetryError::Cancelled {
                attempts,
                last_error: Some(e),
            } => write!(f, "Cancelled after {} attempt(s): {}", attempts, e),
            RetryError::Cancelled {
                attempts,
                last_error: None,
            } => write!(f, "Cancelled after {} attempt(s)", attempts),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Operation(e) => Some(e),
            RetryError::Cancelled { last_error, .. } => {
                last_error.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_error_display() {
        let err: RetryError<&str> = RetryError::Operation("fatal error");
        assert_eq!(err.to_string(), "fatal error");

        let err: RetryError<&str> = RetryError::Cancelled {
            attempts: 2,
            last_error: Some("timeout"),
        };
        assert_eq!(err.to_string(), "Cancelled after 2 attempt(s): timeout");
        assert!(err.is_cancelled());

        let err: RetryError<&str> = RetryError::Cancelled {
            attempts: 0,
            last_error: None,
        };
        assert_eq!(err.to_string(), "Cancelled after 0 attempt(s)");
        assert_eq!(err.into_inner(), None);
    }

    #[test]
    fn test_retry_error_source() {
        use std::error::Error;

        let io = std::io::Error::other("disk busy");
        let err = RetryError::Operation(io);
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk busy".to_string()));
    }
}
