//! File System Library Repository
//!
//! Loads library documents (`.json`, `.yaml`, `.yml`) from a directory tree.
//! Hidden entries and paths excluded by `.gitignore` / `.ignore` files are
//! skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use tracing::debug;

use crate::domain::entities::{Library, LibraryReference};
use crate::domain::ports::LibraryResolver;
use crate::error::{EngineError, EngineResult};

const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Library repository backed by files on disk
#[derive(Debug, Default)]
pub struct FileLibraryRepository {
    libraries: Vec<(PathBuf, Arc<Library>)>,
}

impl FileLibraryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every library document below `root`, in path order
    pub fn load_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("library directory not found: {}", root.display());
        }

        let mut paths = Vec::new();
        for entry in WalkBuilder::new(root).build() {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file && is_library_document(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        let mut repository = Self::new();
        for path in paths {
            repository.load_file(&path)?;
        }
        Ok(repository)
    }

    /// Load one library document and add it
    pub fn load_file(&mut self, path: &Path) -> Result<Arc<Library>> {
        let library = Arc::new(read_library(path)?);
        if let Some((existing, _)) = self
            .libraries
            .iter()
            .find(|(_, l)| l.id() == library.id())
        {
            bail!(
                "library '{}' in {} is already defined in {}",
                library.id(),
                path.display(),
                existing.display()
            );
        }
        debug!(library = library.id(), file = %path.display(), "loaded library");
        self.libraries.push((path.to_path_buf(), library.clone()));
        Ok(library)
    }

    /// Loaded libraries in load order
    pub fn libraries(&self) -> impl Iterator<Item = &Arc<Library>> {
        self.libraries.iter().map(|(_, l)| l)
    }

    /// File a library was loaded from
    pub fn source_of(&self, id: &str) -> Option<&Path> {
        self.libraries
            .iter()
            .find(|(_, l)| l.id() == id)
            .map(|(p, _)| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl LibraryResolver for FileLibraryRepository {
    fn resolve(&self, reference: &LibraryReference) -> EngineResult<Arc<Library>> {
        self.libraries()
            .find(|l| reference.matches(&l.meta))
            .cloned()
            .ok_or_else(|| EngineError::UnresolvedLibrary {
                reference: reference.to_string(),
            })
    }
}

fn is_library_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Parse a library document, choosing the format by extension
pub fn read_library(path: &Path) -> Result<Library> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        Library::from_json(&content)
    } else {
        Library::from_yaml(&content)
    };
    parsed.map_err(|e| {
        anyhow::Error::from(EngineError::LibraryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        let file = dir.join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, content).unwrap();
    }

    #[test]
    fn load_dir_from_empty_dir() {
        let dir = tempdir().unwrap();
        let repo = FileLibraryRepository::load_dir(dir.path()).unwrap();
        assert!(repo.is_empty());
    }

    #[test]
    fn load_dir_reads_json_and_yaml() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.json", r#"{ "id": "common", "oid": "1.2.3" }"#);
        write(dir.path(), "nested/b.yaml", "id: immunization\ninclude:\n  - oid: 1.2.3\n");
        write(dir.path(), "notes.md", "# not a library");

        let repo = FileLibraryRepository::load_dir(dir.path()).unwrap();

        let ids: Vec<_> = repo.libraries().map(|l| l.id().to_string()).collect();
        assert_eq!(ids, vec!["common", "immunization"]);
        assert!(repo.source_of("immunization").unwrap().ends_with("nested/b.yaml"));
        let resolved = repo.resolve(&LibraryReference::by_oid("1.2.3")).unwrap();
        assert_eq!(resolved.id(), "common");
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let repo = FileLibraryRepository::new();
        let err = repo.resolve(&LibraryReference::by_id("missing")).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedLibrary { .. }));
    }

    #[test]
    fn malformed_documents_name_their_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bad.json", "{ not json");
        let err = FileLibraryRepository::load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("bad.json"), "{}", err);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempdir().unwrap();
        write(dir.path(), "one.json", r#"{ "id": "dup" }"#);
        write(dir.path(), "two.yml", "id: dup\n");
        let err = FileLibraryRepository::load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already defined"));
    }
}
