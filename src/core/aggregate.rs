//! Accumulating error value for multi-failure work units.

use std::fmt;

use crate::config::LogPolicy;
use crate::infra::sink::{ErrorEntry, SharedSink};
use crate::util::clock::now_ms;

use super::failure::Failure;

/// An ordered accumulation of underlying failures.
///
/// An empty aggregate is the valid "no error" sentinel; APIs that may carry
/// no failures at all pass `Option<ErrorAggregate>` instead. Insertion order
/// is preserved for diagnostics, and the first appended failure is the
/// primary one used when the aggregate must be reduced to a single
/// representative description.
#[derive(Clone, Default)]
pub struct ErrorAggregate {
    failures: Vec<Failure>,
}

impl ErrorAggregate {
    /// Create an empty aggregate.
    #[must_use]
    pub const fn new() -> Self {
        Self { failures: Vec::new() }
    }

    /// Create an aggregate holding a single failure.
    #[must_use]
    pub fn single(failure: Failure) -> Self {
        Self {
            failures: vec![failure],
        }
    }

    /// Append one failure.
    pub fn append(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    /// Append a failure if present; `None` is a no-op.
    pub fn append_opt(&mut self, failure: Option<Failure>) {
        if let Some(failure) = failure {
            self.failures.push(failure);
        }
    }

    /// Concatenate another aggregate's failures onto this one.
    pub fn merge(&mut self, other: Self) {
        self.failures.extend(other.failures);
    }

    /// The first appended failure.
    #[must_use]
    pub fn primary(&self) -> Option<&Failure> {
        self.failures.first()
    }

    /// Whether no failures have accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of accumulated failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Iterate the accumulated failures in insertion order.
    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.failures.iter()
    }

    /// Persist every constituent failure to the sink.
    ///
    /// Writes happen when `force` is set or the ambient policy enables error
    /// logging. The sink is a best-effort destination; nothing here can
    /// raise. Each entry is annotated with `context` (the traffic direction
    /// plus a human-readable prefix).
    pub fn persist(&self, context: &str, sink: &SharedSink, policy: &LogPolicy, force: bool) {
        if self.is_empty() || !(force || policy.log_errors) {
            return;
        }
        let at_ms = now_ms();
        let mut sink = sink.lock();
        for failure in &self.failures {
            sink.record(ErrorEntry {
                context: context.to_string(),
                message: failure.to_string(),
                recovered: failure.recovery_handler().is_some(),
                at_ms,
            });
        }
    }
}

impl fmt::Display for ErrorAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.primary() {
            None => write!(f, "no failures"),
            Some(primary) if self.failures.len() == 1 => write!(f, "{primary}"),
            Some(primary) => {
                write!(f, "{primary} (+{} more)", self.failures.len() - 1)
            }
        }
    }
}

impl fmt::Debug for ErrorAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorAggregate")
            .field("failures", &self.failures)
            .finish()
    }
}

impl From<Failure> for ErrorAggregate {
    fn from(failure: Failure) -> Self {
        Self::single(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(msg: &str) -> Failure {
        Failure::new(anyhow::anyhow!("{msg}"))
    }

    #[test]
    fn test_empty_is_no_error_sentinel() {
        let agg = ErrorAggregate::new();
        assert!(agg.is_empty());
        assert!(agg.primary().is_none());
        assert_eq!(agg.to_string(), "no failures");
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let mut agg = ErrorAggregate::new();
        agg.append(failure("first"));
        agg.append(failure("second"));
        let messages: Vec<String> = agg.failures().map(ToString::to_string).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(agg.primary().unwrap().to_string(), "first");
    }

    #[test]
    fn test_append_opt_none_is_noop() {
        let mut agg = ErrorAggregate::new();
        agg.append_opt(None);
        assert!(agg.is_empty());
        agg.append_opt(Some(failure("real")));
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn test_merge_concatenates() {
        let mut a = ErrorAggregate::single(failure("A"));
        let b = ErrorAggregate::single(failure("B"));
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.primary().unwrap().to_string(), "A");
    }

    #[test]
    fn test_merged_aggregate_persists_both_failures() {
        use crate::infra::sink::{share, ErrorEntry, ErrorSink, InMemoryErrorSink};
        use parking_lot::Mutex;
        use std::sync::Arc;

        struct Forward(Arc<Mutex<InMemoryErrorSink>>);
        impl ErrorSink for Forward {
            fn record(&mut self, entry: ErrorEntry) {
                self.0.lock().record(entry);
            }
        }
        let buffer = Arc::new(Mutex::new(InMemoryErrorSink::new(8)));
        let sink = share(Forward(Arc::clone(&buffer)));

        let mut merged = ErrorAggregate::single(failure("A"));
        merged.merge(ErrorAggregate::single(failure("B")));

        let silent = LogPolicy {
            log_errors: false,
            ..LogPolicy::default()
        };
        merged.persist("Upload transfer failure", &sink, &silent, false);
        assert!(buffer.lock().entries().is_empty());

        merged.persist("Upload transfer failure", &sink, &LogPolicy::default(), false);
        let entries = buffer.lock().entries();
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["A", "B"]);
    }

    #[test]
    fn test_display_prefixes_primary() {
        let mut agg = ErrorAggregate::single(failure("root cause"));
        agg.append(failure("follow-on"));
        assert_eq!(agg.to_string(), "root cause (+1 more)");
    }
}
