//! Error sink implementations.
//!
//! Provides in-memory persistence for testing and dev, and an append-only
//! file sink for the configured log destination. Sinks are best-effort: a
//! destination write failure is swallowed, never raised.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// A persisted failure record.
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    /// Direction label plus human-readable prefix.
    pub context: String,
    /// Rendered failure message (full error chain).
    pub message: String,
    /// Whether the failure carried a recovery handler.
    pub recovered: bool,
    /// Timestamp milliseconds since epoch.
    pub at_ms: u128,
}

/// Error sink abstraction.
pub trait ErrorSink: Send {
    /// Record a failure entry. Must not raise.
    fn record(&mut self, entry: ErrorEntry);
}

/// Shared handle to a sink, lockable from worker threads and inline callers.
pub type SharedSink = Arc<Mutex<Box<dyn ErrorSink>>>;

/// In-memory error sink for testing and dev.
pub struct InMemoryErrorSink {
    entries: VecDeque<ErrorEntry>,
    max_entries: usize,
}

impl InMemoryErrorSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
        }
    }

    /// Retrieve a snapshot of stored entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl ErrorSink for InMemoryErrorSink {
    fn record(&mut self, entry: ErrorEntry) {
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// Append-only file sink writing to the configured log destination.
pub struct FileErrorSink {
    destination: PathBuf,
}

impl FileErrorSink {
    /// Create a sink appending to `destination`.
    #[must_use]
    pub const fn new(destination: PathBuf) -> Self {
        Self { destination }
    }
}

impl ErrorSink for FileErrorSink {
    fn record(&mut self, entry: ErrorEntry) {
        let line = format!(
            "{} [{}]{} {}\n",
            entry.at_ms,
            entry.context,
            if entry.recovered { "" } else { " [unwrapped]" },
            entry.message
        );
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.destination)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = written {
            // Best-effort sink: losing a log line must never take down the
            // observation path.
            warn!(destination = %self.destination.display(), error = %e, "error sink write failed");
        }
    }
}

/// Wrap a sink implementation into the shared handle the pools consume.
pub fn share(sink: impl ErrorSink + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}
