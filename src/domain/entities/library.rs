//! Library entity - the root of a definition graph
//!
//! A library owns ordered logic blocks and shared models, and references
//! other libraries through `include` entries that are resolved externally.

use serde::Deserialize;
use serde_json::Value;

use super::fact::Fact;
use super::rule::{Protocol, Rule};
use crate::domain::value_objects::{
    ContentHash, DefinitionKind, DefinitionMetadata, DefinitionRef, LifecycleStatus,
};
use crate::error::{EngineError, EngineResult};

/// Reference to another library by id or OID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Default)]
pub struct LibraryReference {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
}

impl LibraryReference {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            oid: None,
        }
    }

    pub fn by_oid(oid: impl Into<String>) -> Self {
        Self {
            id: None,
            oid: Some(oid.into()),
        }
    }

    /// True when the library answers to this reference
    pub fn matches(&self, meta: &DefinitionMetadata) -> bool {
        let id_match = self.id.as_deref().is_some_and(|id| id == meta.id);
        let oid_match = self
            .oid
            .as_deref()
            .is_some_and(|oid| meta.oid.as_deref() == Some(oid));
        id_match || oid_match
    }
}

impl std::fmt::Display for LibraryReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.id, &self.oid) {
            (Some(id), _) => write!(f, "{}", id),
            (None, Some(oid)) => write!(f, "oid:{}", oid),
            (None, None) => write!(f, "<empty reference>"),
        }
    }
}

/// A dataset usable as a propose template
#[derive(Debug, Clone, Deserialize)]
pub struct SharedModel {
    #[serde(flatten)]
    pub meta: DefinitionMetadata,
    pub model: Value,
}

impl SharedModel {
    pub fn new(id: impl Into<String>, model: Value) -> Self {
        Self {
            meta: DefinitionMetadata::new(id),
            model,
        }
    }
}

/// A definition that lives inside a logic block
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ComputableAsset {
    Fact(Fact),
    Rule(Rule),
    Protocol(Protocol),
    Model(SharedModel),
}

impl ComputableAsset {
    pub fn meta(&self) -> &DefinitionMetadata {
        match self {
            ComputableAsset::Fact(f) => &f.meta,
            ComputableAsset::Rule(r) => &r.meta,
            ComputableAsset::Protocol(p) => &p.rule.meta,
            ComputableAsset::Model(m) => &m.meta,
        }
    }

    pub fn reference(&self) -> DefinitionRef {
        let kind = match self {
            ComputableAsset::Fact(_) => DefinitionKind::Fact,
            ComputableAsset::Rule(_) => DefinitionKind::Rule,
            ComputableAsset::Protocol(_) => DefinitionKind::Protocol,
            ComputableAsset::Model(_) => DefinitionKind::Model,
        };
        self.meta().reference(kind)
    }
}

impl From<Fact> for ComputableAsset {
    fn from(fact: Fact) -> Self {
        ComputableAsset::Fact(fact)
    }
}

impl From<Rule> for ComputableAsset {
    fn from(rule: Rule) -> Self {
        ComputableAsset::Rule(rule)
    }
}

impl From<Protocol> for ComputableAsset {
    fn from(protocol: Protocol) -> Self {
        ComputableAsset::Protocol(protocol)
    }
}

impl From<SharedModel> for ComputableAsset {
    fn from(model: SharedModel) -> Self {
        ComputableAsset::Model(model)
    }
}

/// Definitions bound to one subject type
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogicBlock {
    #[serde(flatten)]
    pub meta: DefinitionMetadata,

    /// Subject type this block applies to; `None` applies to every subject
    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub when: Option<super::ExpressionNode>,

    #[serde(default)]
    pub definitions: Vec<ComputableAsset>,
}

impl LogicBlock {
    pub fn new(id: impl Into<String>, context: Option<&str>) -> Self {
        Self {
            meta: DefinitionMetadata::new(id),
            context: context.map(str::to_string),
            when: None,
            definitions: Vec::new(),
        }
    }

    /// Builder: add a definition
    pub fn with(mut self, asset: ComputableAsset) -> Self {
        self.definitions.push(asset);
        self
    }

    /// Builder: set the guard
    pub fn when(mut self, guard: super::ExpressionNode) -> Self {
        self.when = Some(guard);
        self
    }

    /// True when this block is bound to the given subject type
    pub fn applies_to(&self, subject_type: Option<&str>) -> bool {
        match (&self.context, subject_type) {
            (None, _) => true,
            (Some(ctx), _) if ctx.is_empty() => true,
            (Some(ctx), Some(ty)) => ctx.eq_ignore_ascii_case(ty),
            (Some(_), None) => false,
        }
    }

    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.definitions.iter().filter_map(|d| match d {
            ComputableAsset::Fact(f) => Some(f),
            _ => None,
        })
    }

    pub fn reference(&self) -> DefinitionRef {
        self.meta.reference(DefinitionKind::LogicBlock)
    }
}

/// Root node of a definition graph
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Library {
    #[serde(flatten)]
    pub meta: DefinitionMetadata,

    #[serde(default, alias = "includes")]
    pub include: Vec<LibraryReference>,

    #[serde(default)]
    pub models: Vec<SharedModel>,

    #[serde(default, alias = "logic")]
    pub blocks: Vec<LogicBlock>,

    /// Fingerprint of the document this library was loaded from
    #[serde(skip)]
    pub source_hash: Option<ContentHash>,
}

impl Library {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: DefinitionMetadata::new(id),
            ..Self::default()
        }
    }

    /// Parse a JSON library document and fingerprint it
    pub fn from_json(document: &str) -> EngineResult<Self> {
        let mut library: Library = serde_json::from_str(document)?;
        library.source_hash = Some(ContentHash::from_bytes(document.as_bytes()));
        Ok(library)
    }

    /// Parse a YAML library document and fingerprint it
    pub fn from_yaml(document: &str) -> EngineResult<Self> {
        let mut library: Library =
            serde_yaml_ng::from_str(document).map_err(|e| EngineError::LibraryLoad {
                path: Default::default(),
                message: e.to_string(),
            })?;
        library.source_hash = Some(ContentHash::from_bytes(document.as_bytes()));
        Ok(library)
    }

    /// Builder: add a logic block
    pub fn with_block(mut self, block: LogicBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Builder: add a shared model
    pub fn with_model(mut self, model: SharedModel) -> Self {
        self.models.push(model);
        self
    }

    /// Builder: include another library
    pub fn with_include(mut self, reference: LibraryReference) -> Self {
        self.include.push(reference);
        self
    }

    /// Builder: set the lifecycle status
    pub fn with_status(mut self, status: LifecycleStatus) -> Self {
        self.meta.status = status;
        self
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn reference(&self) -> DefinitionRef {
        self.meta.reference(DefinitionKind::Library)
    }

    /// Every shared model: library-level datasets then block-level models
    pub fn shared_models(&self) -> impl Iterator<Item = &SharedModel> {
        self.models.iter().chain(self.blocks.iter().flat_map(|b| {
            b.definitions.iter().filter_map(|d| match d {
                ComputableAsset::Model(m) => Some(m),
                _ => None,
            })
        }))
    }
}
