//! JSON Path Accessor
//!
//! `PathAccessor` over `serde_json::Value` models. Arrays fan out: a path
//! step applied to a collection applies to every element. A `[guard]` on a
//! segment picks elements of the collection it addresses:
//!
//! - `participation[2]` - by position
//! - `participation[RecordTarget]` - by classifier field value
//! - `participation[role=RecordTarget]` - by an explicit field

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::domain::ports::PathAccessor;
use crate::domain::value_objects::{ObjectPath, PathSegment};
use crate::error::AccessError;

/// Accessor for JSON subject models
#[derive(Debug, Clone)]
pub struct JsonPathAccessor {
    type_key: String,
    id_key: String,
    classifier_fields: Vec<String>,
    case_insensitive: bool,
}

impl Default for JsonPathAccessor {
    fn default() -> Self {
        Self {
            type_key: "$type".to_string(),
            id_key: "id".to_string(),
            classifier_fields: vec![
                "classifier".to_string(),
                "role".to_string(),
                "type".to_string(),
            ],
            case_insensitive: true,
        }
    }
}

impl JsonPathAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[model]` and `[accessor]` config sections
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            type_key: config.model.type_key.clone(),
            id_key: config.model.id_key.clone(),
            classifier_fields: config.accessor.classifier_fields.clone(),
            case_insensitive: config.accessor.case_insensitive,
        }
    }

    /// Builder: set the type discriminator key
    pub fn with_type_key(mut self, key: impl Into<String>) -> Self {
        self.type_key = key.into();
        self
    }

    /// Builder: set the identity key
    pub fn with_id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = key.into();
        self
    }

    /// Builder: set the fields a bare guard is matched against
    pub fn with_classifier_fields(mut self, fields: Vec<String>) -> Self {
        self.classifier_fields = fields;
        self
    }

    /// Builder: match object keys exactly
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Existing key matching `name`, or `name` itself
    fn key_in(&self, map: &Map<String, Value>, name: &str) -> String {
        if map.contains_key(name) || !self.case_insensitive {
            return name.to_string();
        }
        map.keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn guard_matches(&self, item: &Value, guard: &str) -> bool {
        if let Some((key, expected)) = guard.split_once('=') {
            return self
                .member(item, key.trim())
                .is_some_and(|v| text_matches(v, expected.trim()));
        }
        self.classifier_fields
            .iter()
            .any(|field| self.member(item, field).is_some_and(|v| text_matches(v, guard)))
    }

    /// Element created when a write addresses a guard nothing matches
    fn guard_template(&self, guard: &str) -> Value {
        let mut template = Map::new();
        match guard.split_once('=') {
            Some((key, value)) => {
                template.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
            }
            None => {
                let field = self
                    .classifier_fields
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "classifier".to_string());
                template.insert(field, Value::String(guard.to_string()));
            }
        }
        Value::Object(template)
    }

    /// Mutable slot for one segment, created on demand
    fn slot<'v>(
        &self,
        current: &'v mut Value,
        segment: &PathSegment,
        path: &ObjectPath,
    ) -> Result<&'v mut Value, AccessError> {
        let not_an_object = || AccessError::NotAnObject {
            path: path.to_string(),
            segment: segment.name.clone(),
        };
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return Err(not_an_object());
        };
        let key = self.key_in(map, &segment.name);
        let entry = map.entry(key).or_insert(Value::Null);
        let Some(guard) = segment.guard.as_deref() else {
            return Ok(entry);
        };
        if entry.is_null() {
            *entry = Value::Array(Vec::new());
        }
        let Value::Array(items) = entry else {
            return Err(not_an_object());
        };
        if let Some(index) = segment.index() {
            return items.get_mut(index).ok_or(AccessError::IndexOutOfRange {
                path: path.to_string(),
                index,
            });
        }
        let position = match items.iter().position(|item| self.guard_matches(item, guard)) {
            Some(position) => position,
            None => {
                items.push(self.guard_template(guard));
                items.len() - 1
            }
        };
        Ok(&mut items[position])
    }
}

fn fan_out(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

fn text_matches(value: &Value, text: &str) -> bool {
    match value {
        Value::String(s) => s.eq_ignore_ascii_case(text),
        Value::Number(_) | Value::Bool(_) => value.to_string() == text,
        _ => false,
    }
}

impl PathAccessor for JsonPathAccessor {
    fn select<'v>(&self, target: &'v Value, path: &ObjectPath) -> Vec<&'v Value> {
        let mut current: Vec<&'v Value> = vec![target];
        for segment in path.segments() {
            let mut next = Vec::new();
            for value in current.into_iter().flat_map(fan_out) {
                let Some(child) = self.member(value, &segment.name) else {
                    continue;
                };
                match (&segment.guard, segment.index()) {
                    (None, _) => next.push(child),
                    (Some(_), Some(index)) => {
                        next.extend(child.as_array().and_then(|items| items.get(index)))
                    }
                    (Some(guard), None) => next.extend(
                        fan_out(child)
                            .iter()
                            .filter(|item| self.guard_matches(item, guard)),
                    ),
                }
            }
            current = next;
        }
        current
            .into_iter()
            .flat_map(fan_out)
            .filter(|v| !v.is_null())
            .collect()
    }

    fn member<'v>(&self, target: &'v Value, name: &str) -> Option<&'v Value> {
        let map = target.as_object()?;
        if let Some(value) = map.get(name) {
            return Some(value);
        }
        if !self.case_insensitive {
            return None;
        }
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    fn set(&self, target: &mut Value, path: &ObjectPath, value: Value) -> Result<(), AccessError> {
        let Some((parent, last)) = path.split_last() else {
            return Err(AccessError::EmptyPath);
        };
        let mut current = target;
        for segment in parent.segments() {
            current = self.slot(current, segment, path)?;
        }
        *self.slot(current, last, path)? = value;
        Ok(())
    }

    fn type_of<'v>(&self, target: &'v Value) -> Option<&'v str> {
        self.member(target, &self.type_key)?.as_str()
    }

    fn id_of(&self, target: &Value) -> Option<Value> {
        self.member(target, &self.id_key)
            .filter(|v| !v.is_null())
            .cloned()
    }
}
