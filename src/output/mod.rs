//! Operator-facing output.
//!
//! All user-visible text flows through an [`OutputSink`]. Diagnostics use
//! `tracing` instead.

mod sink;

pub use sink::{MemorySink, OutputSink, StdoutSink};
