//! Rule and Protocol entities

use serde::{Deserialize, Serialize};

use super::action::{Action, ActionCollection};
use super::expression::ExpressionNode;
use crate::domain::value_objects::{DefinitionKind, DefinitionMetadata, DefinitionRef};

/// A guarded collection of actions
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(flatten)]
    pub meta: DefinitionMetadata,

    /// Absent guard means always true
    #[serde(default)]
    pub when: Option<ExpressionNode>,

    #[serde(default)]
    pub then: ActionCollection,
}

impl Rule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: DefinitionMetadata::new(id),
            when: None,
            then: ActionCollection::default(),
        }
    }

    /// Builder: set the guard
    pub fn when(mut self, guard: ExpressionNode) -> Self {
        self.when = Some(guard);
        self
    }

    /// Builder: append an action
    pub fn then(mut self, action: Action) -> Self {
        self.then.actions.push(action);
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
        self.meta.reference(DefinitionKind::Rule)
    }
}

/// A rule tagged as an externally schedulable entry point
#[derive(Debug, Clone, Deserialize)]
pub struct Protocol {
    #[serde(flatten)]
    pub rule: Rule,

    /// Group identifiers used by schedulers to select protocols
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Protocol {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            scopes: Vec::new(),
        }
    }

    /// Builder: add a scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.rule.meta.id
    }

    pub fn meta(&self) -> &DefinitionMetadata {
        &self.rule.meta
    }

    pub fn in_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s.eq_ignore_ascii_case(scope))
    }

    pub fn reference(&self) -> DefinitionRef {
        self.rule.meta.reference(DefinitionKind::Protocol)
    }
}

/// Result of computing a rule or protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleOutcome {
    Executed,
    NotExecuted,
}

impl RuleOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, RuleOutcome::Executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protocol_flattens_rule_fields() {
        let protocol: Protocol = serde_json::from_value(json!({
            "id": "mmr",
            "oid": "1.3.5",
            "version": "2.0",
            "scopes": ["immunization"],
            "when": "scopedObject.age < 18",
            "then": [{ "type": "ruleRef", "rule": "r" }]
        }))
        .unwrap();
        assert_eq!(protocol.id(), "mmr");
        assert_eq!(protocol.meta().version.as_deref(), Some("2.0"));
        assert!(protocol.in_scope("Immunization"));
        assert!(protocol.rule.when.is_some());
        assert_eq!(protocol.rule.then.len(), 1);
    }

    #[test]
    fn rule_without_guard() {
        let rule: Rule = serde_json::from_value(json!({ "id": "always" })).unwrap();
        assert!(rule.when.is_none());
        assert!(rule.then.is_empty());
    }
}
