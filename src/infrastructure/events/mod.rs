//! Execution Observer Implementations
//!
//! Provides concrete implementations of ExecutionObserver:
//! - JsonTraceSink: NDJSON event stream
//! - LogObserver: forwards events to `tracing`

mod json;
mod log;

pub use json::JsonTraceSink;
pub use log::LogObserver;
