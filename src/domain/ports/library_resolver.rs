//! Library resolver port
//!
//! Resolves `include` references into loaded libraries.

use std::sync::Arc;

use crate::domain::entities::{Library, LibraryReference};
use crate::error::EngineResult;

/// Source of libraries addressable by id or OID
///
/// Implementations:
/// - `FileLibraryRepository` - libraries loaded from a directory tree
/// - `InMemoryLibraryRepository` - libraries registered in code
pub trait LibraryResolver {
    /// Resolve a reference, failing with `UnresolvedLibrary` when unknown
    fn resolve(&self, reference: &LibraryReference) -> EngineResult<Arc<Library>>;
}
