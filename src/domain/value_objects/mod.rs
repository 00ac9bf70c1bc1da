//! Domain Value Objects
//!
//! Immutable value types that represent domain concepts.

mod hash;
mod issue;
mod lifecycle;
mod metadata;
mod object_path;
mod parameters;
mod value_type;

pub use hash::ContentHash;
pub use issue::{DetectedIssue, IssuePriority};
pub use lifecycle::LifecycleStatus;
pub use metadata::{DefinitionKind, DefinitionMetadata, DefinitionRef};
pub use object_path::{ObjectPath, PathSegment};
pub use parameters::ExecutionParameters;
pub use value_type::{format_temporal, parse_temporal, ValueType};
