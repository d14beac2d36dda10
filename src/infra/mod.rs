//! Infrastructure adapters for error persistence sinks.

pub mod sink;

pub use sink::{ErrorEntry, ErrorSink, FileErrorSink, InMemoryErrorSink, SharedSink};
