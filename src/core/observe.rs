//! Mandatory failure observation.
//!
//! Guarantees that every faulted work item's failure is decomposed,
//! recovered where a handler exists, folded into an aggregate annotated with
//! its direction, and persisted even when no caller ever inspects the
//! item's result. The worker dispatch loop and the inline-execution path
//! each invoke this directly on completion, so each item is drained through
//! exactly one call site and nothing depends on memory reclamation.

use tracing::{error, warn};

use crate::config::LogPolicy;
use crate::infra::sink::SharedSink;

use super::aggregate::ErrorAggregate;
use super::pool::Direction;

/// Log target for critical alerts raised on unwrapped failures.
///
/// An unwrapped failure signals an engineering defect: a work unit that
/// should have carried a recovery handler did not. No interactive user is
/// guaranteed to be present, so the escalation is a non-blocking
/// critical-severity emission on this dedicated target, never a modal block.
pub const ALERT_TARGET: &str = "transfer_scheduler::alert";

/// Drain a faulted work item's failures.
///
/// For each constituent: append it to the observed aggregate; if it carries
/// a recovery handler, run the one-shot action with the full faulted context
/// and fold any secondary failure back in; otherwise mark the aggregate
/// unwrapped. Persists with logging forced whenever an unwrapped failure was
/// present, bypassing a disabled logging policy.
pub fn observe_failure(
    direction: Direction,
    faulted: &ErrorAggregate,
    sink: &SharedSink,
    policy: &LogPolicy,
) {
    let mut observed = ErrorAggregate::new();
    let mut unwrapped = false;

    for failure in faulted.failures() {
        observed.append(failure.clone());
        match failure.recovery_handler() {
            Some(handler) => {
                let secondary = handler.execute(faulted);
                if secondary.is_some() {
                    warn!(
                        %direction,
                        failure = %failure,
                        "recovery action produced a secondary failure"
                    );
                }
                observed.append_opt(secondary);
            }
            None => unwrapped = true,
        }
    }

    if observed.is_empty() {
        return;
    }

    error!(
        %direction,
        failures = observed.len(),
        unwrapped,
        primary = %observed,
        "work item faulted"
    );

    let context = format!("{direction} transfer failure");
    observed.persist(&context, sink, policy, unwrapped);

    if unwrapped {
        error!(
            target: ALERT_TARGET,
            %direction,
            primary = %observed,
            "unwrapped work item failure; the work unit was never wrapped with a recovery handler"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::failure::{DeferredRecovery, Failure};
    use crate::infra::sink::{share, InMemoryErrorSink, SharedSink};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn capture() -> (SharedSink, Arc<Mutex<InMemoryErrorSink>>) {
        // Two handles onto one buffer is awkward with Box<dyn ErrorSink>;
        // use a forwarding sink so tests can read what was persisted.
        struct Forward(Arc<Mutex<InMemoryErrorSink>>);
        impl crate::infra::sink::ErrorSink for Forward {
            fn record(&mut self, entry: crate::infra::sink::ErrorEntry) {
                self.0.lock().record(entry);
            }
        }
        let buffer = Arc::new(Mutex::new(InMemoryErrorSink::new(64)));
        (share(Forward(Arc::clone(&buffer))), buffer)
    }

    fn suppressed_policy() -> LogPolicy {
        LogPolicy {
            log_errors: false,
            ..LogPolicy::default()
        }
    }

    #[test]
    fn test_recovery_runs_with_full_context() {
        let (sink, buffer) = capture();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let mut faulted = ErrorAggregate::single(Failure::recoverable(
            anyhow::anyhow!("chunk rejected"),
            DeferredRecovery::new((), move |(), original| {
                seen_clone.store(original.len(), Ordering::SeqCst);
                None
            }),
        ));
        faulted.append(Failure::recoverable(
            anyhow::anyhow!("session stale"),
            DeferredRecovery::new((), |(), _| None),
        ));

        observe_failure(Direction::Upload, &faulted, &sink, &LogPolicy::default());

        // Handler received the full faulted context, both constituents.
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(buffer.lock().entries().len(), 2);
    }

    #[test]
    fn test_wrapped_failures_respect_disabled_policy() {
        let (sink, buffer) = capture();
        let faulted = ErrorAggregate::single(Failure::recoverable(
            anyhow::anyhow!("transient"),
            DeferredRecovery::new((), |(), _| None),
        ));

        observe_failure(Direction::Download, &faulted, &sink, &suppressed_policy());
        assert!(buffer.lock().entries().is_empty());
    }

    #[test]
    fn test_unwrapped_failure_forces_logging() {
        let (sink, buffer) = capture();
        let faulted = ErrorAggregate::single(Failure::new(anyhow::anyhow!("never wrapped")));

        observe_failure(Direction::Download, &faulted, &sink, &suppressed_policy());

        let entries = buffer.lock().entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].recovered);
        assert!(entries[0].context.contains("Download"));
    }

    #[test]
    fn test_secondary_failure_is_folded_and_persisted() {
        let (sink, buffer) = capture();
        let faulted = ErrorAggregate::single(Failure::recoverable(
            anyhow::anyhow!("primary fault"),
            DeferredRecovery::new((), |(), _| {
                Some(Failure::new(anyhow::anyhow!("recovery also failed")))
            }),
        ));

        observe_failure(Direction::Upload, &faulted, &sink, &LogPolicy::default());

        let entries = buffer.lock().entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.message.contains("recovery also failed")));
    }
}
