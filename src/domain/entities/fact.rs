//! Fact entity - a named, memoizable computation over the current scope

use serde::Deserialize;

use super::expression::ExpressionNode;
use crate::domain::value_objects::{DefinitionKind, DefinitionMetadata, DefinitionRef, ValueType};

/// Guarded transform applied to a fact's raw value
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeEntry {
    pub when: ExpressionNode,
    /// Receives the raw value as the `value` parameter
    pub emit: ExpressionNode,
}

impl NormalizeEntry {
    pub fn new(when: ExpressionNode, emit: ExpressionNode) -> Self {
        Self { when, emit }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    #[serde(flatten)]
    pub meta: DefinitionMetadata,

    #[serde(alias = "expression")]
    pub computation: ExpressionNode,

    #[serde(default)]
    pub negate: bool,

    #[serde(default)]
    pub value_type: Option<ValueType>,

    #[serde(default)]
    pub normalize: Vec<NormalizeEntry>,
}

impl Fact {
    pub fn new(id: impl Into<String>, computation: ExpressionNode) -> Self {
        Self {
            meta: DefinitionMetadata::new(id),
            computation,
            negate: false,
            value_type: None,
            normalize: Vec::new(),
        }
    }

    /// Builder: negate the result
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Builder: declare the result type
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Builder: append a normalize entry
    pub fn with_normalize(mut self, entry: NormalizeEntry) -> Self {
        self.normalize.push(entry);
        self
    }

    /// Builder: replace the metadata
    pub fn with_meta(mut self, meta: DefinitionMetadata) -> Self {
        self.meta = meta;
        self
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn reference(&self) -> DefinitionRef {
        self.meta.reference(DefinitionKind::Fact)
    }
}
