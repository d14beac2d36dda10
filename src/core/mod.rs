//! Core scheduling: pools, failure observation, recovery, notifications.

pub mod aggregate;
pub mod error;
pub mod failure;
pub mod notify;
pub mod observe;
pub mod pool;
pub mod registry;

pub use aggregate::ErrorAggregate;
pub use error::{AppResult, SchedulerError};
pub use failure::{DeferredRecovery, Failure, RecoveryHandler};
pub use notify::{ChangeBus, StatusChange, WorkStatus};
pub use observe::{observe_failure, ALERT_TARGET};
pub use pool::{Direction, JobFuture, OutstandingFn, TransferPool, WorkId, WorkItem};
pub use registry::TransferPools;
