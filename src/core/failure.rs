//! Constituent failure values and deferred recovery actions.
//!
//! A [`Failure`] is one underlying fault raised by a transfer work unit. A
//! unit wrapped at a risky call site attaches a [`DeferredRecovery`] so the
//! scheduler's observation path can run its recovery action later, at most
//! once, no matter how many threads race to trigger it.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use super::aggregate::ErrorAggregate;

/// A single failure raised by a transfer work unit.
///
/// Carries an opaque error payload plus an optional recovery capability. The
/// payload is reference-counted so aggregates stay cheap to clone while the
/// observation path holds the original alongside the folded output.
#[derive(Clone)]
pub struct Failure {
    error: Arc<anyhow::Error>,
    recovery: Option<Arc<dyn RecoveryHandler>>,
}

impl Failure {
    /// Wrap an error with no recovery capability.
    ///
    /// When the observation path drains a failure built this way it is
    /// treated as unwrapped: logging is forced and a critical alert raised,
    /// since a work unit that should have carried a recovery did not.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: Arc::new(error.into()),
            recovery: None,
        }
    }

    /// Wrap an error together with its recovery handler.
    pub fn recoverable(error: impl Into<anyhow::Error>, handler: impl RecoveryHandler + 'static) -> Self {
        Self {
            error: Arc::new(error.into()),
            recovery: Some(Arc::new(handler)),
        }
    }

    /// The recovery capability, if this failure carries one.
    #[must_use]
    pub fn recovery_handler(&self) -> Option<&Arc<dyn RecoveryHandler>> {
        self.recovery.as_ref()
    }

    /// The underlying error payload.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full chain: the root cause matters more than the top frame in logs.
        write!(f, "{:#}", self.error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("error", &self.error)
            .field("recoverable", &self.recovery.is_some())
            .finish()
    }
}

/// Object-safe recovery capability attached to a [`Failure`].
///
/// Implementors must guarantee at-most-once execution; callers may invoke
/// [`RecoveryHandler::execute`] concurrently from multiple threads.
pub trait RecoveryHandler: Send + Sync {
    /// Run the recovery action with the full faulted context.
    ///
    /// Returns a secondary failure if the action itself failed; `None` when
    /// the action succeeded or had already been executed.
    fn execute(&self, original: &ErrorAggregate) -> Option<Failure>;
}

/// Armed contents of a [`DeferredRecovery`]: captured state plus the action.
struct Armed<S> {
    state: S,
    action: Box<dyn FnOnce(S, &ErrorAggregate) -> Option<Failure> + Send>,
}

/// One-shot recovery action bound to captured state.
///
/// Created at the moment a risky operation is wrapped, consumed exactly once
/// when the owning work item's failure is finally observed, inert thereafter.
/// The slot is taken under the instance mutex, so the executed-flag
/// transition is atomic with the execution itself.
pub struct DeferredRecovery<S> {
    slot: Mutex<Option<Armed<S>>>,
}

impl<S: Send> DeferredRecovery<S> {
    /// Bind a recovery action to its captured state.
    pub fn new<F>(state: S, action: F) -> Self
    where
        F: FnOnce(S, &ErrorAggregate) -> Option<Failure> + Send + 'static,
    {
        Self {
            slot: Mutex::new(Some(Armed {
                state,
                action: Box::new(action),
            })),
        }
    }

    /// Construct without a recovery action.
    ///
    /// This is a configuration defect: a work unit wrapped this way can never
    /// be meaningfully recovered. It is reported through the logging channel
    /// immediately rather than raised, and the handler executes inertly.
    pub fn unarmed(state: S) -> Self {
        error!(
            "DeferredRecovery constructed without a recovery action; \
             the wrapped work unit cannot be recovered"
        );
        let _ = state;
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Whether the recovery action is still pending execution.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<S: Send> RecoveryHandler for DeferredRecovery<S> {
    fn execute(&self, original: &ErrorAggregate) -> Option<Failure> {
        // Hold the lock across the action so a racing caller cannot observe
        // the slot empty while the action is still in flight.
        let mut slot = self.slot.lock();
        let armed = slot.take()?;

        match catch_unwind(AssertUnwindSafe(move || (armed.action)(armed.state, original))) {
            Ok(secondary) => secondary,
            Err(payload) => Some(Failure::new(anyhow::anyhow!(
                "recovery action panicked: {}",
                panic_message(&payload)
            ))),
        }
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
