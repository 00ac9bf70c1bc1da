//! Assign Policy
//!
//! Whether an assign action may write over the current destination value.

use serde_json::Value;

/// Outcome of checking a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    Write,
    /// Destination already holds a value and overwrite is off
    Keep,
}

/// Decide for one destination. Null, absent, empty strings and empty
/// collections count as unset.
pub fn decide_write(overwrite: bool, current: Option<&Value>) -> WriteDecision {
    if overwrite || current.map_or(true, is_default) {
        WriteDecision::Write
    } else {
        WriteDecision::Keep
    }
}

fn is_default(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
