//! In-memory library repository
//!
//! Libraries registered in code, for embedding hosts and tests.

use std::sync::Arc;

use crate::domain::entities::{Library, LibraryReference};
use crate::domain::ports::LibraryResolver;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Default, Clone)]
pub struct InMemoryLibraryRepository {
    libraries: Vec<Arc<Library>>,
}

impl InMemoryLibraryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a library
    pub fn with(mut self, library: Library) -> Self {
        self.insert(library);
        self
    }

    /// Register a library, replacing any with the same id
    pub fn insert(&mut self, library: Library) -> Arc<Library> {
        let library = Arc::new(library);
        self.libraries.retain(|l| l.id() != library.id());
        self.libraries.push(library.clone());
        library
    }

    pub fn libraries(&self) -> &[Arc<Library>] {
        &self.libraries
    }
}

impl LibraryResolver for InMemoryLibraryRepository {
    fn resolve(&self, reference: &LibraryReference) -> EngineResult<Arc<Library>> {
        self.libraries
            .iter()
            .find(|l| reference.matches(&l.meta))
            .cloned()
            .ok_or_else(|| EngineError::UnresolvedLibrary {
                reference: reference.to_string(),
            })
    }
}
