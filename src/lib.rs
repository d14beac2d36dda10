//! # Transfer Scheduler
//!
//! The concurrency-limiting execution layer of a file-synchronization client.
//!
//! This library runs upload and download work units against a remote storage
//! service while bounding how many run simultaneously, guaranteeing that every
//! unit's failure is observed and logged exactly once, and reporting live
//! queue/in-flight counts to the rest of the sync engine.
//!
//! ## Core Problem Solved
//!
//! A sync engine fires opaque transfer jobs and rarely inspects their results:
//!
//! - **Remote fairness limits**: the storage service tolerates only a handful
//!   of concurrent requests per direction, so concurrency must be bounded by
//!   construction, not convention
//! - **Unobserved failures**: a faulted transfer nobody awaits must still be
//!   drained, its recovery action run, and the error logged
//! - **Per-item recovery**: a failing unit of work carries its own recovery
//!   action, guaranteed to run at most once even under races
//!
//! ## Key Features
//!
//! - **Directional pools**: one bounded [`core::TransferPool`] per traffic
//!   direction (download, upload), each with its own concurrency ceiling,
//!   FIFO queue, and worker dispatch loop
//! - **Mandatory failure observation**: every faulted item is decomposed,
//!   recovered where possible, aggregated, and persisted, with forced
//!   logging and a critical alert when a failure was never wrapped
//! - **Change notification bus**: status broadcasts with
//!   subscriber failures folded into the same aggregated-error discipline
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use transfer_scheduler::config::SchedulerConfig;
//! use transfer_scheduler::core::{Direction, TransferPools, WorkItem};
//!
//! let config = Arc::new(SchedulerConfig::default());
//! let pools = TransferPools::new();
//!
//! let uploads = pools.get(Direction::Upload, Some(&config))?;
//! uploads.submit(WorkItem::new("upload chunk 0", || async {
//!     // push bytes to the remote service...
//!     Ok(())
//! }));
//! ```
//!
//! For complete examples, see `tests/transfer_pool_test.rs`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling: pools, failure observation, recovery, notifications.
pub mod core;
/// Configuration models for ceilings and the logging policy.
pub mod config;
/// Infrastructure adapters for error persistence sinks.
pub mod infra;
/// Shared utilities.
pub mod util;
