//! Configuration models for ceilings and the logging policy.

pub mod scheduler;

pub use scheduler::{LogPolicy, PoolSettings, SchedulerConfig};
