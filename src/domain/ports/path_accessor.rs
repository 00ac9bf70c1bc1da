//! Path accessor port - property access on subject models
//!
//! The engine never reaches into subject models directly. Every path read,
//! write and deep copy goes through this trait so hosts can plug in their
//! own object model. `JsonPathAccessor` in the infrastructure layer is the
//! implementation for JSON documents.

use serde_json::Value;

use crate::domain::value_objects::ObjectPath;
use crate::error::AccessError;

/// Abstract property-path access over subject models
///
/// Implementations:
/// - `JsonPathAccessor` - JSON documents with classifier guards
/// - test doubles that count or reject accesses
pub trait PathAccessor: Send + Sync {
    /// Every value addressed by `path`; guards and collections may fan out
    fn select<'v>(&self, target: &'v Value, path: &ObjectPath) -> Vec<&'v Value>;

    /// One named member of an object, honouring key matching rules
    fn member<'v>(&self, target: &'v Value, name: &str) -> Option<&'v Value>;

    /// Write `value` at `path`, creating intermediate objects as needed
    fn set(&self, target: &mut Value, path: &ObjectPath, value: Value) -> Result<(), AccessError>;

    /// Discriminator naming the model type, if present
    fn type_of<'v>(&self, target: &'v Value) -> Option<&'v str>;

    /// Identity of a model, used to reference it from issues and proposals
    fn id_of(&self, target: &Value) -> Option<Value>;

    /// First addressed value
    fn get<'v>(&self, target: &'v Value, path: &ObjectPath) -> Option<&'v Value> {
        self.select(target, path).into_iter().next()
    }

    /// True when the path addresses at least one non-null value
    fn is_set(&self, target: &Value, path: &ObjectPath) -> bool {
        self.select(target, path).iter().any(|v| !v.is_null())
    }

    /// Independent copy of a model
    fn deep_copy(&self, target: &Value) -> Value {
        target.clone()
    }
}
