//! Change-notification bus shared across pools.
//!
//! Broadcasts "a work item's status changed" events to subscribers. A
//! subscriber reports its own failures by appending into the aggregate
//! threaded through the dispatch; a panicking subscriber is caught, folded
//! into the aggregate, and never allowed to disturb later subscribers.

use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::RwLock;
use tracing::debug;

use super::aggregate::ErrorAggregate;
use super::failure::{panic_message, Failure};
use super::pool::{Direction, WorkId};

/// Completion status carried by a [`StatusChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// The item completed without failures.
    Succeeded,
    /// The item faulted; its failures were drained through observation.
    Faulted,
    /// The item was cancelled before it started.
    Cancelled,
}

/// A sync-relevant status change for one work item.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
    /// The item whose status changed.
    pub item: WorkId,
    /// The direction of the pool that owned the item.
    pub direction: Direction,
    /// The new status.
    pub status: WorkStatus,
}

type SubscriberFn = Box<dyn Fn(&StatusChange, &mut ErrorAggregate) + Send + Sync>;

/// Broadcast channel for work-item status changes.
#[derive(Default)]
pub struct ChangeBus {
    subscribers: RwLock<Vec<SubscriberFn>>,
}

impl ChangeBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    ///
    /// The subscriber reports its own failures by appending them into the
    /// aggregate it receives; it never returns one.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&StatusChange, &mut ErrorAggregate) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Box::new(handler));
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Broadcast a status change to every subscriber.
    ///
    /// With no subscribers the input aggregate is returned unchanged,
    /// including `None`. Otherwise an aggregate is materialized lazily and
    /// threaded through each subscriber in registration order; an empty
    /// result maps back to `None`. A panicking subscriber contributes a
    /// failure to the aggregate instead of propagating.
    pub fn notify(
        &self,
        change: &StatusChange,
        errors: Option<ErrorAggregate>,
    ) -> Option<ErrorAggregate> {
        let subscribers = self.subscribers.read();
        if subscribers.is_empty() {
            return errors;
        }

        debug!(
            item = %change.item,
            direction = %change.direction,
            status = ?change.status,
            subscribers = subscribers.len(),
            "broadcasting status change"
        );

        let mut aggregate = errors.unwrap_or_default();
        for subscriber in subscribers.iter() {
            let dispatched = catch_unwind(AssertUnwindSafe(|| subscriber(change, &mut aggregate)));
            if let Err(payload) = dispatched {
                aggregate.append(Failure::new(anyhow::anyhow!(
                    "notification subscriber panicked: {}",
                    panic_message(&payload)
                )));
            }
        }

        if aggregate.is_empty() {
            None
        } else {
            Some(aggregate)
        }
    }
}
