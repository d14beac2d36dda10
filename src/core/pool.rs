//! Directional bounded worker pool.
//!
//! One long-lived [`TransferPool`] exists per traffic direction (download,
//! upload), each with its own concurrency ceiling, FIFO queue, and worker
//! dispatch loop. Workers are dedicated OS threads, each owning a
//! single-threaded tokio runtime so transfer futures never touch the sync
//! engine's main runtime.
//!
//! # Design
//!
//! - **Bounded by construction**: `running` is only incremented under the
//!   pool mutex after checking it against the ceiling
//! - **Amortized spawn**: a worker spawned for a fresh item keeps draining
//!   the queue before exiting, so bursts of queued work reuse one thread
//! - **Mandatory observation**: every faulted item is drained through the
//!   failure-observation path, from exactly one call site per item

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::LogPolicy;
use crate::infra::sink::SharedSink;

use super::aggregate::ErrorAggregate;
use super::failure::{panic_message, Failure};
use super::notify::{ChangeBus, StatusChange, WorkStatus};
use super::observe::observe_failure;

/// Traffic direction, fixed at pool construction.
///
/// Selects which concurrency ceiling applies and labels every count and log
/// line the pool emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Pulling remote content down to the local replica.
    Download,
    /// Pushing local content up to the remote service.
    Upload,
}

impl Direction {
    pub(crate) const fn worker_prefix(self) -> &'static str {
        match self {
            Self::Download => "dl-worker",
            Self::Upload => "ul-worker",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "Download"),
            Self::Upload => write!(f, "Upload"),
        }
    }
}

/// Identity of a submitted work item, distinct from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(Uuid);

impl WorkId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Boxed future produced by a work item's job closure.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), ErrorAggregate>> + Send>>;

type JobFn = Box<dyn FnOnce() -> JobFuture + Send>;

/// An opaque asynchronous unit of work submitted to a pool.
///
/// The pool owns the item from submission until it completes, is cancelled,
/// or is abandoned by dispose. A faulted outcome carries the item's
/// constituent failures as an [`ErrorAggregate`].
pub struct WorkItem {
    id: WorkId,
    label: String,
    job: JobFn,
}

impl WorkItem {
    /// Create a work item from a label and a job closure producing a future.
    pub fn new<F, Fut>(label: impl Into<String>, job: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ErrorAggregate>> + Send + 'static,
    {
        Self {
            id: WorkId::fresh(),
            label: label.into(),
            job: Box::new(move || Box::pin(job())),
        }
    }

    /// The item's identity.
    #[must_use]
    pub const fn id(&self) -> WorkId {
        self.id
    }

    /// Human-readable label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

/// Telemetry callback invoked with the direction and items outstanding
/// (`queue + running + inline`) whenever that quantity changes.
pub type OutstandingFn = Arc<dyn Fn(Direction, usize) + Send + Sync>;

/// Mutable pool state, all guarded by one mutex per instance.
struct PoolState {
    queue: VecDeque<WorkItem>,
    running: usize,
    inline: usize,
    disposed: bool,
}

impl PoolState {
    fn outstanding(&self) -> usize {
        self.queue.len() + self.running + self.inline
    }
}

/// Parts shared between the pool handle and its worker threads.
struct Shared {
    direction: Direction,
    ceiling: usize,
    state: Mutex<PoolState>,
    policy: LogPolicy,
    sink: SharedSink,
    telemetry: Option<OutstandingFn>,
    bus: Option<Arc<ChangeBus>>,
    worker_seq: AtomicU64,
}

impl Shared {
    fn emit_outstanding(&self, count: usize) {
        if let Some(telemetry) = &self.telemetry {
            telemetry(self.direction, count);
        }
    }

    /// Broadcast a status change; subscriber failures join the same
    /// aggregated-error discipline as item failures.
    fn publish(&self, id: WorkId, status: WorkStatus) {
        let Some(bus) = &self.bus else { return };
        let change = StatusChange {
            item: id,
            direction: self.direction,
            status,
        };
        if let Some(subscriber_errors) = bus.notify(&change, None) {
            let context = format!("{} notification", self.direction);
            subscriber_errors.persist(&context, &self.sink, &self.policy, false);
        }
    }
}

/// Bounded worker pool for one traffic direction.
pub struct TransferPool {
    shared: Arc<Shared>,
}

impl TransferPool {
    /// Create a pool with a fixed concurrency ceiling.
    ///
    /// The ceiling is a remote-fairness policy value; `running` can never
    /// exceed it because the increment happens under the pool mutex only
    /// after the check.
    #[must_use]
    pub fn new(direction: Direction, ceiling: usize, policy: LogPolicy, sink: SharedSink) -> Self {
        info!(%direction, ceiling, "transfer pool initialized");
        Self {
            shared: Arc::new(Shared {
                direction,
                ceiling,
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    running: 0,
                    inline: 0,
                    disposed: false,
                }),
                policy,
                sink,
                telemetry: None,
                bus: None,
                worker_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Attach the outstanding-count telemetry callback.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: OutstandingFn) -> Self {
        let shared = Arc::get_mut(&mut self.shared)
            .expect("with_telemetry must be called before the pool is shared");
        shared.telemetry = Some(telemetry);
        self
    }

    /// Attach a change-notification bus for status broadcasts.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<ChangeBus>) -> Self {
        let shared = Arc::get_mut(&mut self.shared)
            .expect("with_bus must be called before the pool is shared");
        shared.bus = Some(bus);
        self
    }

    /// This pool's traffic direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.shared.direction
    }

    /// This pool's concurrency ceiling.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.shared.ceiling
    }

    /// Snapshot of `queue + running + inline`. Eventually consistent.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.shared.state.lock().outstanding()
    }

    /// Whether this pool has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    /// Enqueue work. Never suspends the caller.
    ///
    /// If a worker slot is free the item is dispatched immediately on a
    /// fresh worker thread; otherwise it joins the FIFO queue. Submitting
    /// to a disposed pool drops the item with a warning, since no worker
    /// will ever drain it. The outstanding-count telemetry fires on every
    /// submit.
    pub fn submit(&self, item: WorkItem) {
        let (dispatch, outstanding) = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                warn!(
                    direction = %self.shared.direction,
                    item = %item.id(),
                    label = item.label(),
                    "submitted to a disposed pool; dropping item"
                );
                // Retaining the item would pin its closure for the pool's
                // remaining lifetime with no worker left to drain it.
                drop(item);
                (None, state.outstanding())
            } else if state.running < self.shared.ceiling {
                state.running += 1;
                (Some(item), state.outstanding())
            } else {
                debug!(
                    direction = %self.shared.direction,
                    item = %item.id(),
                    depth = state.queue.len() + 1,
                    "ceiling reached; item queued"
                );
                state.queue.push_back(item);
                (None, state.outstanding())
            }
        };

        self.shared.emit_outstanding(outstanding);

        if let Some(item) = dispatch {
            spawn_worker(Arc::clone(&self.shared), item);
        }
    }

    /// Execute an unsubmitted item synchronously on the calling thread.
    ///
    /// Blocks for the duration of the item by definition. A faulted outcome
    /// drives the failure-observation path before this returns, because no
    /// worker thread will ever revisit the item. Must not be called from
    /// inside an async runtime.
    pub fn run_inline(&self, item: WorkItem) {
        self.execute_inline(item);
    }

    /// Remove a queued item and execute it inline on the calling thread.
    ///
    /// Returns whether the item was found and executed. Together with
    /// [`Self::run_inline`] this covers both halves of the inline-execution
    /// contract; split in two because a queued item is owned by the pool,
    /// not the caller.
    pub fn run_queued_inline(&self, id: WorkId) -> bool {
        let item = {
            let mut state = self.shared.state.lock();
            let position = state.queue.iter().position(|queued| queued.id() == id);
            position.and_then(|index| state.queue.remove(index))
        };
        match item {
            Some(item) => {
                self.execute_inline(item);
                true
            }
            None => false,
        }
    }

    /// Remove a not-yet-started item from the queue without executing it.
    ///
    /// Returns whether it was found. O(n); cancellation is rare. Publishes a
    /// `Cancelled` status change on success.
    pub fn cancel_queued(&self, id: WorkId) -> bool {
        let (removed, outstanding) = {
            let mut state = self.shared.state.lock();
            let position = state.queue.iter().position(|queued| queued.id() == id);
            let removed = position.and_then(|index| state.queue.remove(index)).is_some();
            (removed, state.outstanding())
        };
        if removed {
            debug!(direction = %self.shared.direction, item = %id, "queued item cancelled");
            self.shared.emit_outstanding(outstanding);
            self.shared.publish(id, WorkStatus::Cancelled);
        }
        removed
    }

    /// Mark this direction's pool disposed. Idempotent.
    ///
    /// Running workers finish their current item, observe the flag, and exit
    /// without pulling further queued work; queued items are abandoned and
    /// never run. Callers must not assume drained execution on dispose.
    pub fn dispose(&self) {
        let mut state = self.shared.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        info!(
            direction = %self.shared.direction,
            abandoned = state.queue.len(),
            running = state.running,
            "transfer pool disposed"
        );
    }

    fn execute_inline(&self, item: WorkItem) {
        let shared = &self.shared;
        let outstanding = {
            let mut state = shared.state.lock();
            state.inline += 1;
            state.outstanding()
        };
        shared.emit_outstanding(outstanding);

        let id = item.id();
        debug!(direction = %shared.direction, item = %id, label = item.label(), "executing item inline");
        let outcome = run_job(item);
        conclude(shared, id, outcome);

        let outstanding = {
            let mut state = shared.state.lock();
            state.inline -= 1;
            state.outstanding()
        };
        shared.emit_outstanding(outstanding);
    }
}

impl fmt::Debug for TransferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferPool")
            .field("direction", &self.shared.direction)
            .field("ceiling", &self.shared.ceiling)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// Spawn a worker thread for a freshly dispatched item.
///
/// The worker runs the item, then keeps draining the queue until it is empty
/// or the pool is disposed, amortizing thread-spawn cost across bursts.
fn spawn_worker(shared: Arc<Shared>, first: WorkItem) {
    let seq = shared.worker_seq.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-{seq}", shared.direction.worker_prefix());

    thread::Builder::new()
        .name(name)
        .spawn(move || {
            debug!(direction = %shared.direction, worker = seq, "worker thread started");

            let mut item = first;
            loop {
                let id = item.id();
                let outcome = run_job(item);
                conclude(&shared, id, outcome);

                // Dispatch-loop advance: same worker continues, no new spawn.
                let (next, outstanding) = {
                    let mut state = shared.state.lock();
                    if state.disposed {
                        state.running -= 1;
                        (None, state.outstanding())
                    } else if let Some(next) = state.queue.pop_front() {
                        (Some(next), state.outstanding())
                    } else {
                        state.running -= 1;
                        (None, state.outstanding())
                    }
                };
                shared.emit_outstanding(outstanding);

                match next {
                    Some(next) => item = next,
                    None => break,
                }
            }

            debug!(direction = %shared.direction, worker = seq, "worker thread exiting");
        })
        .expect("failed to spawn worker thread");
}

/// Drive a work item's future to completion on a current-thread runtime.
///
/// A panicking item is converted into a faulted outcome so one item can
/// never corrupt the pool's counters or stop the dispatch loop.
fn run_job(item: WorkItem) -> Result<(), ErrorAggregate> {
    let WorkItem { label, job, .. } = item;
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(label = %label, error = %e, "failed to build runtime for work item");
            return Err(ErrorAggregate::single(Failure::new(
                anyhow::Error::new(e).context("failed to build runtime for work item"),
            )));
        }
    };

    match catch_unwind(AssertUnwindSafe(|| runtime.block_on(job()))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(ErrorAggregate::single(Failure::new(anyhow::anyhow!(
            "work item `{label}` panicked: {}",
            panic_message(&payload)
        )))),
    }
}

/// Conclude one item: observe a faulted outcome and broadcast the status.
fn conclude(shared: &Shared, id: WorkId, outcome: Result<(), ErrorAggregate>) {
    match outcome {
        Ok(()) => {
            debug!(direction = %shared.direction, item = %id, "item completed");
            shared.publish(id, WorkStatus::Succeeded);
        }
        Err(faulted) => {
            observe_failure(shared.direction, &faulted, &shared.sink, &shared.policy);
            shared.publish(id, WorkStatus::Faulted);
        }
    }
}
