//! CDSS - clinical decision-support rule engine
//!
//! Libraries of facts, rules and protocols are compiled into executable
//! closures and evaluated against a clinical subject (a patient, an
//! observation, any JSON model). Evaluation produces proposals (new models
//! recommended for the subject) and detected issues, and never mutates the
//! caller's subject outside of the configured analysis fields.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-exports for convenience
pub use application::DecisionEngine;
pub use config::{ConfigWarning, EngineConfig};
pub use domain::entities::{EngineOutput, Library, LibraryReference, Proposal};
pub use domain::services::{Severity, ValidationIssue};
pub use domain::value_objects::{DetectedIssue, ExecutionParameters, IssuePriority, LifecycleStatus};
pub use error::{EngineError, EngineResult};
pub use infrastructure::{
    FileLibraryRepository, InMemoryLibraryRepository, JsonPathAccessor, JsonTraceSink, LogObserver,
};
