//! Definition identity and metadata
//!
//! `DefinitionMetadata` is flattened into every definition node.
//! `DefinitionRef` is the small owned identity used by stack frames,
//! diagnostics and error reports.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LifecycleStatus;

/// Identity and descriptive metadata shared by all definition nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionMetadata {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub oid: Option<String>,

    #[serde(default)]
    pub uuid: Option<Uuid>,

    #[serde(default)]
    pub status: LifecycleStatus,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default, alias = "doc")]
    pub documentation: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,
}

impl DefinitionMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder: set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the lifecycle status
    pub fn with_status(mut self, status: LifecycleStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Builder: set the OID
    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    /// Name if present, otherwise the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// True when `key` matches the id, name or OID
    pub fn answers_to(&self, key: &str) -> bool {
        self.id == key || self.name.as_deref() == Some(key) || self.oid.as_deref() == Some(key)
    }

    pub fn reference(&self, kind: DefinitionKind) -> DefinitionRef {
        DefinitionRef {
            kind,
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// What kind of node a frame or diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefinitionKind {
    /// The root frame of an execution context
    Context,
    Library,
    LogicBlock,
    Fact,
    Rule,
    Protocol,
    Model,
    Actions,
    Propose,
    Repeat,
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DefinitionKind::Context => "context",
            DefinitionKind::Library => "library",
            DefinitionKind::LogicBlock => "logic block",
            DefinitionKind::Fact => "fact",
            DefinitionKind::Rule => "rule",
            DefinitionKind::Protocol => "protocol",
            DefinitionKind::Model => "model",
            DefinitionKind::Actions => "actions",
            DefinitionKind::Propose => "propose",
            DefinitionKind::Repeat => "repeat",
        };
        f.write_str(label)
    }
}

/// Owned identity of a definition node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionRef {
    pub kind: DefinitionKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DefinitionRef {
    pub fn new(kind: DefinitionKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: None,
        }
    }

    /// Frames for anonymous actions have no id
    pub fn anonymous(kind: DefinitionKind) -> Self {
        Self::new(kind, "")
    }

    /// Returns true for assets that own an evaluation boundary
    pub fn is_asset(&self) -> bool {
        matches!(
            self.kind,
            DefinitionKind::Fact | DefinitionKind::Rule | DefinitionKind::Protocol
        )
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl std::fmt::Display for DefinitionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() && self.name.is_none() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} '{}'", self.kind, self.display_name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_deserializes_with_defaults() {
        let meta: DefinitionMetadata =
            serde_json::from_str(r#"{"id": "isAlive", "doc": "patient alive"}"#).unwrap();
        assert_eq!(meta.id, "isAlive");
        assert_eq!(meta.status, LifecycleStatus::Active);
        assert_eq!(meta.documentation.as_deref(), Some("patient alive"));
        assert_eq!(meta.display_name(), "isAlive");
    }

    #[test]
    fn metadata_answers_to_id_name_and_oid() {
        let meta = DefinitionMetadata::new("p1")
            .with_name("Measles")
            .with_oid("1.3.6.1");
        assert!(meta.answers_to("p1"));
        assert!(meta.answers_to("Measles"));
        assert!(meta.answers_to("1.3.6.1"));
        assert!(!meta.answers_to("other"));
    }

    #[test]
    fn reference_display() {
        let r = DefinitionMetadata::new("r1")
            .with_name("Check weight")
            .reference(DefinitionKind::Rule);
        assert_eq!(r.to_string(), "rule 'Check weight'");
        assert_eq!(
            DefinitionRef::anonymous(DefinitionKind::Actions).to_string(),
            "actions"
        );
    }
}
