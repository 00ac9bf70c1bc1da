//! Domain Policies
//!
//! Business rules and policies that govern behavior.
//! These are pure functions that operate on domain entities.

mod assign_policy;
mod lifecycle_policy;

pub use assign_policy::{decide_write, WriteDecision};
pub use lifecycle_policy::{Admission, LifecyclePolicy};
