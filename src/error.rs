//! Error types for the CDSS engine
//!
//! Uses `thiserror` for library errors. Validation problems are not errors:
//! they are collected as [`ValidationIssue`](crate::domain::services::ValidationIssue)s.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::value_objects::{DefinitionRef, LifecycleStatus};

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure to turn an expression or path into executable form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {position} in `{text}`")]
pub struct CompileError {
    /// The expression text being compiled
    pub text: String,
    /// Byte offset of the offending token
    pub position: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(text: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position,
            message: message.into(),
        }
    }
}

/// Failure to read or write a property path on a subject
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("cannot set an empty path")]
    EmptyPath,

    #[error("segment '{segment}' of '{path}' does not address an object")]
    NotAnObject { path: String, segment: String },

    #[error("index {index} is out of range in '{path}'")]
    IndexOutOfRange { path: String, index: usize },
}

/// An error raised while a computable asset or action was executing.
///
/// Carries the identity of the owning asset and the frame chain that was
/// live when the error was first observed, innermost frame first.
#[derive(Debug)]
pub struct EvaluationError {
    pub asset: DefinitionRef,
    pub stack: Vec<DefinitionRef>,
    pub cause: EngineError,
}

impl EvaluationError {
    /// Render the frame chain as a human-readable stack trace
    pub fn stack_trace(&self) -> String {
        self.stack
            .iter()
            .map(|frame| format!("  at {}", frame))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evaluation of {} failed: {}", self.asset, self.cause)
    }
}

impl std::error::Error for EvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine misuse: frame entered without a context, double root, empty exit
    #[error("invalid engine state: {0}")]
    InvalidState(String),

    /// A definition in a non-runnable lifecycle state was asked to run
    #[error("{definition} is {status} and cannot be evaluated")]
    LifecycleForbidden {
        definition: DefinitionRef,
        status: LifecycleStatus,
    },

    /// Wrapped failure of a computable asset or action
    #[error(transparent)]
    Evaluation(Box<EvaluationError>),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("property access failed: {0}")]
    Access(#[from] AccessError),

    #[error("type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: String,
        expected: String,
        found: String,
    },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A named fact, rule or model is not visible to this execution
    #[error("no {kind} named '{name}' is visible to this execution")]
    Lookup { kind: &'static str, name: String },

    #[error("query over '{query}' failed: {message}")]
    Query { query: String, message: String },

    #[error("repeat exceeded {limit} iterations without satisfying its until condition")]
    RepeatLimit { limit: u32 },

    #[error("stack depth limit of {limit} frames exceeded")]
    StackOverflow { limit: usize },

    #[error("library '{reference}' could not be resolved")]
    UnresolvedLibrary { reference: String },

    #[error("failed to load library {path}: {message}")]
    LibraryLoad { path: PathBuf, message: String },

    #[error("invalid configuration in {file}: {message}")]
    InvalidConfig { file: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn type_mismatch(
        operation: impl Into<String>,
        expected: impl Into<String>,
        found: &serde_json::Value,
    ) -> Self {
        EngineError::TypeMismatch {
            operation: operation.into(),
            expected: expected.into(),
            found: crate::domain::services::builtins::type_name(found).to_string(),
        }
    }

    /// Engine misuse and lifecycle refusals are never wrapped
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidState(_) | EngineError::LifecycleForbidden { .. }
        )
    }

    /// The evaluation wrapper, if this error already crossed an asset boundary
    pub fn evaluation(&self) -> Option<&EvaluationError> {
        match self {
            EngineError::Evaluation(inner) => Some(&**inner),
            _ => None,
        }
    }

    /// The innermost error beneath any evaluation wrapper
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::Evaluation(inner) => inner.cause.root_cause(),
            other => other,
        }
    }
}
