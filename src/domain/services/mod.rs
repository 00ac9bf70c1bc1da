//! Domain Services
//!
//! Expression compilation and evaluation of the definition graph.
//!
//! - `snippet` - lexer and parser for the rule expression language
//! - `query` - path selectors and filter predicates
//! - `builtins` - operators, functions and methods shared by compiled code
//! - `compiler` - expression nodes to cached closures
//! - `computation` - `compute` for facts, rules and protocols
//! - `executor` - action interpretation
//! - `validator` - structural checks and the ahead-of-time compile pass

pub mod builtins;
mod compiler;
mod computation;
mod executor;
pub mod query;
pub mod snippet;
mod validator;

pub use compiler::{compile, CompiledExpression, Env};
pub use query::CompiledQuery;
pub use validator::{validate_libraries, Severity, ValidationIssue};
