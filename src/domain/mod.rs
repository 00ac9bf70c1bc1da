//! Domain Layer
//!
//! The rule engine proper: definition graph, expression compiler, execution
//! context and action interpretation. No I/O happens here.
//!
//! ## Structure
//!
//! - `entities/` - Definition graph (Library, LogicBlock, Fact, Rule, Protocol, Action)
//! - `value_objects/` - Immutable value types (ObjectPath, LifecycleStatus, DetectedIssue)
//! - `execution/` - Execution context and stack frames
//! - `services/` - Compiler, executor, validator
//! - `policies/` - Lifecycle gating and assignment overwrite rules
//! - `diagnostics/` - Debug session recording
//! - `ports/` - Interface definitions for infrastructure
//!
//! ## Design Principles
//!
//! 1. **No I/O** - Libraries arrive through `LibraryResolver`, subjects through `PathAccessor`
//! 2. **Explicit state** - The execution context is passed to every call, never global
//! 3. **Ports & Adapters** - Hosts plug in their object model and library storage

pub mod diagnostics;
pub mod entities;
pub mod execution;
pub mod policies;
pub mod ports;
pub mod services;
pub mod value_objects;
