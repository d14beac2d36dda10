//! Per-direction pool registry.
//!
//! Exactly one pool exists per traffic direction for the registry's
//! lifetime, created lazily on first request and shared by all callers
//! thereafter. The registry is an explicit value owned by the sync engine,
//! not hidden global state; construct it once at startup and hand it to
//! every caller that submits transfer work.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::SchedulerConfig;
use crate::infra::sink::{share, FileErrorSink, SharedSink};

use super::error::SchedulerError;
use super::notify::ChangeBus;
use super::pool::{Direction, OutstandingFn, TransferPool};

/// Registry holding one [`TransferPool`] per direction.
///
/// The first configuration supplied to [`TransferPools::get`] wins for the
/// whole registry; configurations on later calls are ignored. Each direction
/// slot sits behind its own mutex, distinct from the pools' internal queue
/// mutexes, so singleton lookup never serializes against queue churn.
#[derive(Default)]
pub struct TransferPools {
    config: Mutex<Option<Arc<SchedulerConfig>>>,
    sink: Mutex<Option<SharedSink>>,
    download: Mutex<Option<Arc<TransferPool>>>,
    upload: Mutex<Option<Arc<TransferPool>>>,
    telemetry: Option<OutstandingFn>,
    bus: Option<Arc<ChangeBus>>,
}

impl TransferPools {
    /// Create an empty registry; pools are created lazily by [`Self::get`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the outstanding-count telemetry callback for both directions.
    #[must_use]
    pub fn with_telemetry<F>(mut self, telemetry: F) -> Self
    where
        F: Fn(Direction, usize) + Send + Sync + 'static,
    {
        self.telemetry = Some(Arc::new(telemetry));
        self
    }

    /// Attach a change-notification bus shared by both directions.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<ChangeBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Override the error sink, replacing the file sink derived from the
    /// logging policy. Intended for tests and embedding hosts.
    #[must_use]
    pub fn with_sink(self, sink: SharedSink) -> Self {
        *self.sink.lock() = Some(sink);
        self
    }

    /// Get or create the pool for `direction`.
    ///
    /// The first caller to supply a configuration fixes it for the registry;
    /// later configurations are ignored.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::ConfigurationMissing`] when no configuration was
    ///   ever supplied and none is given now.
    /// - [`SchedulerError::InvalidConfig`] when the first-supplied
    ///   configuration fails validation.
    pub fn get(
        &self,
        direction: Direction,
        config: Option<&Arc<SchedulerConfig>>,
    ) -> Result<Arc<TransferPool>, SchedulerError> {
        let cfg = {
            let mut stored = self.config.lock();
            match (stored.as_ref(), config) {
                (Some(first), _) => Arc::clone(first),
                (None, Some(offered)) => {
                    offered.validate().map_err(SchedulerError::InvalidConfig)?;
                    *stored = Some(Arc::clone(offered));
                    Arc::clone(offered)
                }
                (None, None) => return Err(SchedulerError::ConfigurationMissing(direction)),
            }
        };

        let slot = match direction {
            Direction::Download => &self.download,
            Direction::Upload => &self.upload,
        };
        let mut slot = slot.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }

        let sink = {
            let mut sink = self.sink.lock();
            Arc::clone(sink.get_or_insert_with(|| {
                share(FileErrorSink::new(cfg.log.destination.clone()))
            }))
        };

        let settings = match direction {
            Direction::Download => &cfg.download,
            Direction::Upload => &cfg.upload,
        };

        let mut pool = TransferPool::new(direction, settings.ceiling, cfg.log.clone(), sink);
        if let Some(telemetry) = &self.telemetry {
            pool = pool.with_telemetry(Arc::clone(telemetry));
        }
        if let Some(bus) = &self.bus {
            pool = pool.with_bus(Arc::clone(bus));
        }

        let pool = Arc::new(pool);
        *slot = Some(Arc::clone(&pool));
        info!(%direction, ceiling = settings.ceiling, "pool created for direction");
        Ok(pool)
    }

    /// Dispose both directions' pools, where they exist.
    pub fn dispose_all(&self) {
        for slot in [&self.download, &self.upload] {
            if let Some(pool) = slot.lock().as_ref() {
                pool.dispose();
            }
        }
    }
}
