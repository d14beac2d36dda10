//! Error types for scheduler misuse.
//!
//! Item-level transfer faults never surface through this enum; they are
//! absorbed by the failure-observation path (see [`crate::core::observe`]).

use thiserror::Error;

use super::pool::Direction;

/// Errors produced by scheduler components for caller misuse.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A pool was requested before any configuration was ever supplied.
    #[error("no configuration supplied for {0} pool")]
    ConfigurationMissing(Direction),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
