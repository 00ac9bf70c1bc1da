//! Path Accessor Implementations
//!
//! Provides concrete implementations of PathAccessor:
//! - JsonPathAccessor: JSON documents with classifier guards

mod json;

pub use json::JsonPathAccessor;
