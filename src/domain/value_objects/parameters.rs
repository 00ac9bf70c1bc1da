//! Execution parameters
//!
//! An open, string-keyed map handed to `execute` / `analyze`. A few keys are
//! reserved for engine control; every other entry is published into the
//! execution context as a variable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for one evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionParameters {
    values: BTreeMap<String, Value>,
}

impl ExecutionParameters {
    /// Enables debug instrumentation and includes trial-use definitions
    pub const DEBUG: &'static str = "_debug";
    /// Allows evaluation of definitions that are not active
    pub const ALLOW_NON_ACTIVE: &'static str = "_allowNonActive";
    /// Restricts protocol execution to those tagged with this scope
    pub const SCOPE: &'static str = "_scope";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder: enable debugging
    pub fn debug(self) -> Self {
        self.with(Self::DEBUG, true)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_debug(&self) -> bool {
        self.flag(Self::DEBUG)
    }

    pub fn allows_non_active(&self) -> bool {
        self.flag(Self::ALLOW_NON_ACTIVE)
    }

    pub fn scope(&self) -> Option<&str> {
        self.values.get(Self::SCOPE).and_then(Value::as_str)
    }

    /// Entries that are not reserved engine keys
    pub fn variables(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values
            .iter()
            .filter(|(key, _)| !Self::is_reserved(key))
    }

    pub fn is_reserved(key: &str) -> bool {
        matches!(key, Self::DEBUG | Self::ALLOW_NON_ACTIVE | Self::SCOPE)
    }

    fn flag(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        }
    }

    /// Parse a `key=value` assignment. The value is read as JSON when it
    /// parses, otherwise as a plain string.
    pub fn parse_assignment(text: &str) -> Result<(String, Value), String> {
        let (key, raw) = text
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", text))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("missing parameter name in '{}'", text));
        }
        let value = serde_json::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        Ok((key.to_string(), value))
    }
}

impl FromIterator<(String, Value)> for ExecutionParameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
