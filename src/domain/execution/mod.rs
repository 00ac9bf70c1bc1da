//! Execution state
//!
//! - `context` - per-run state, journal and frame state machine
//! - `frame` - stack frames, owners and RAII guards
//! - `registry` - fact / rule / model lookup by name

mod context;
mod frame;
mod registry;

pub use context::{ContextBuilder, ContextSettings, ExecutionContext, ExecutionMode, ExecutionOutcome};
pub use frame::{scope_of, FrameGuard, FrameOwner, ScopeRef, StackFrame};
pub use registry::{DefinitionRegistry, RuleTarget};
