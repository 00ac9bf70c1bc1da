//! Repository Implementations
//!
//! Concrete implementations of the `LibraryResolver` port.

mod file;
mod memory;

pub use file::{read_library, FileLibraryRepository};
pub use memory::InMemoryLibraryRepository;
