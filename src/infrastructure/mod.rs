//! Infrastructure Layer
//!
//! Concrete implementations of domain ports:
//! - `accessor/` - `PathAccessor` over JSON documents
//! - `repositories/` - `LibraryResolver` over files and memory
//! - `events/` - `ExecutionObserver` sinks

pub mod accessor;
pub mod events;
pub mod repositories;

pub use accessor::JsonPathAccessor;
pub use events::{JsonTraceSink, LogObserver};
pub use repositories::{FileLibraryRepository, InMemoryLibraryRepository};
