//! Deferred recovery action tests under concurrency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use transfer_scheduler::core::{DeferredRecovery, ErrorAggregate, Failure, RecoveryHandler};

#[test]
fn test_recovery_action_runs_exactly_once_under_race() {
    let executions = Arc::new(AtomicUsize::new(0));
    let executions_clone = Arc::clone(&executions);
    let handler: Arc<DeferredRecovery<()>> = Arc::new(DeferredRecovery::new((), move |(), _| {
        executions_clone.fetch_add(1, Ordering::SeqCst);
        // Linger so racing callers overlap the execution window.
        thread::sleep(std::time::Duration::from_millis(10));
        None
    }));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let handler = Arc::clone(&handler);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let original = ErrorAggregate::single(Failure::new(anyhow::anyhow!("shared fault")));
            barrier.wait();
            handler.execute(&original)
        }));
    }

    let secondary_count = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Option::is_some)
        .count();

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_count, 0);
    assert!(!handler.is_armed());
}

#[test]
fn test_unarmed_handler_is_inert_and_does_not_raise() {
    let handler = DeferredRecovery::unarmed("orphaned state".to_string());
    assert!(!handler.is_armed());
    let original = ErrorAggregate::single(Failure::new(anyhow::anyhow!("fault")));
    assert!(handler.execute(&original).is_none());
    assert!(handler.execute(&original).is_none());
}

#[test]
fn test_captured_state_moves_into_the_action() {
    let witnessed = Arc::new(AtomicUsize::new(0));
    let witnessed_clone = Arc::clone(&witnessed);
    let handler = DeferredRecovery::new(vec![3_usize, 4, 5], move |state, original| {
        witnessed_clone.store(state.iter().sum::<usize>() + original.len(), Ordering::SeqCst);
        None
    });

    let original = ErrorAggregate::single(Failure::new(anyhow::anyhow!("fault")));
    handler.execute(&original);
    assert_eq!(witnessed.load(Ordering::SeqCst), 13);
}

#[test]
fn test_merged_aggregates_preserve_primary_and_both_failures() {
    let mut a = ErrorAggregate::single(Failure::new(anyhow::anyhow!("A")));
    let b = ErrorAggregate::single(Failure::new(anyhow::anyhow!("B")));
    a.merge(b);

    assert_eq!(a.len(), 2);
    assert_eq!(a.primary().unwrap().to_string(), "A");
    let rendered: Vec<String> = a.failures().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["A", "B"]);
}
