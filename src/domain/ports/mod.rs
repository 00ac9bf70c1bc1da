//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure layer provides concrete implementations.

pub mod execution_events;
pub mod library_resolver;
pub mod path_accessor;

pub use execution_events::{ExecutionEvent, ExecutionObserver, NoopObserver};
pub use library_resolver::LibraryResolver;
pub use path_accessor::PathAccessor;
