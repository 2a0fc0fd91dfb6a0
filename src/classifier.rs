//! Error classification policies.
//!
//! A classifier answers one question for the executor: should this error
//! trigger another attempt? Four forms are provided:
//!
//! - [`Always`] - every error is retryable
//! - any `Fn(&E) -> bool` - caller-defined predicate
//! - [`AllowList`] - retry only if the message contains a known-transient pattern
//! - [`DenyList`] - retry unless the message contains a known-fatal pattern

use std::fmt::Display;

/// Decides whether a failed attempt should be retried.
pub trait Classifier<E> {
    fn is_retryable(&self, error: &E) -> bool;

    /// Short name recorded on the retry span.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

impl<E, F> Classifier<E> for F
where
    F: Fn(&E) -> bool,
{
    fn is_retryable(&self, error: &E) -> bool {
        self(error)
    }
}

/// Retries every error until the attempt budget runs out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Always;

impl<E> Classifier<E> for Always {
    fn is_retryable(&self, _error: &E) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "always"
    }
}

/// Retries only errors whose message contains at least one of the patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    patterns: Vec<String>,
}

impl AllowList {
    /// Builds the list from the substrings that mark an error as transient.
    pub fn new<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Patterns in the order they were given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl<E: Display> Classifier<E> for AllowList {
    fn is_retryable(&self, error: &E) -> bool {
        contains_error_message(error, &self.patterns)
    }

    fn kind(&self) -> &'static str {
        "allow-list"
    }
}

/// Retries every error except those whose message contains one of the patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyList {
    patterns: Vec<String>,
}

impl DenyList {
    /// Builds the list from the substrings that mark an error as fatal.
    pub fn new<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Patterns in the order they were given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl<E: Display> Classifier<E> for DenyList {
    fn is_retryable(&self, error: &E) -> bool {
        !contains_error_message(error, &self.patterns)
    }

    fn kind(&self) -> &'static str {
        "deny-list"
    }
}

/// Checks whether the rendered error message contains any of the patterns.
///
/// Matching is a case-sensitive substring test. An empty pattern set never
/// matches; an empty pattern matches every message.
pub fn contains_error_message<E, P>(error: &E, patterns: &[P]) -> bool
where
    E: Display + ?Sized,
    P: AsRef<str>,
{
    if patterns.is_empty() {
        return false;
    }
    let message = error.to_string();
    patterns
        .iter()
        .any(|pattern| message.contains(pattern.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_contains_error_message_matches_substring() {
        let err = anyhow!("this is a temporary issue");
        assert!(contains_error_message(&err, &["temporary", "intermittent"]));
    }

    #[test]
    fn test_contains_error_message_no_match() {
        let err = anyhow!("this is a fatal issue");
        assert!(!contains_error_message(&err, &["temporary", "intermittent"]));
    }

    #[test]
    fn test_contains_error_message_is_case_sensitive() {
        let err = anyhow!("Connection Timeout");
        assert!(!contains_error_message(&err, &["timeout"]));
        assert!(contains_error_message(&err, &["Timeout"]));
    }

    #[test]
    fn test_contains_error_message_empty_patterns() {
        let err = anyhow!("anything");
        let patterns: [&str; 0] = [];
        assert!(!contains_error_message(&err, &patterns));

        let empty = anyhow!("");
        assert!(!contains_error_message(&empty, &patterns));
    }

    #[test]
    fn test_contains_error_message_empty_message() {
        let err = anyhow!("");
        assert!(!contains_error_message(&err, &["timeout"]));
        assert!(contains_error_message(&err, &[""]));
    }

    #[test]
    fn test_contains_error_message_accepts_owned_patterns() {
        let patterns = vec!["reset".to_string()];
        assert!(contains_error_message("connection reset by peer", &patterns));
    }

    #[test]
    fn test_always_retries_everything() {
        assert!(Classifier::<&str>::is_retryable(&Always, &"fatal error"));
        assert!(Classifier::<i32>::is_retryable(&Always, &0));
    }

    #[test]
    fn test_allow_list() {
        let classifier = AllowList::new(["timeout", "temporary"]);
        assert!(classifier.is_retryable(&"timeout error"));
        assert!(!classifier.is_retryable(&"fatal error"));
        assert_eq!(classifier.patterns(), ["timeout", "temporary"]);
    }

    #[test]
    fn test_deny_list() {
        let classifier = DenyList::new(["fatal", "permanent"]);
        assert!(!classifier.is_retryable(&"fatal error"));
        assert!(classifier.is_retryable(&"temporary error"));
    }

    #[test]
    fn test_empty_lists() {
        let allow = AllowList::default();
        let deny = DenyList::default();
        assert!(!allow.is_retryable(&"timeout"));
        assert!(deny.is_retryable(&"fatal"));
    }

    #[test]
    fn test_classifier_kinds() {
        let custom = |_: &&str| false;
        assert_eq!(Classifier::<&str>::kind(&Always), "always");
        assert_eq!(Classifier::<&str>::kind(&AllowList::default()), "allow-list");
        assert_eq!(Classifier::<&str>::kind(&DenyList::default()), "deny-list");
        assert_eq!(Classifier::<&str>::kind(&custom), "custom");
    }

    #[test]
    fn test_closure_classifier() {
        let classifier = |err: &anyhow::Error| err.to_string() != "non-retryable error";
        assert!(!classifier.is_retryable(&anyhow!("non-retryable error")));
        assert!(classifier.is_retryable(&anyhow!("temporary error")));
    }
}
