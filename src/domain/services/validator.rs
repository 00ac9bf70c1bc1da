//! Definition graph validation
//!
//! Walks scoped libraries and collects structural problems as
//! [`ValidationIssue`]s instead of failing. Validation doubles as the
//! ahead-of-time compile pass: every expression node is compiled here, so a
//! graph that validates cleanly never compiles lazily during evaluation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::entities::{
    Action, ActionCollection, AssignAction, ComputableAsset, ExpressionKind, ExpressionNode, Fact,
    Library, ProposeAction, Rule,
};
use crate::domain::value_objects::DefinitionRef;

/// How serious a validation finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One finding, attributed to the definition it was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub definition: DefinitionRef,
    pub message: String,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.definition, self.message)
    }
}

/// Names visible across the scoped library set
#[derive(Default)]
struct Visible {
    facts: HashSet<String>,
    rules: HashSet<String>,
    models: HashSet<String>,
}

impl Visible {
    fn collect(libraries: &[Arc<Library>]) -> Self {
        let mut visible = Self::default();
        for library in libraries {
            for model in &library.models {
                visible.insert_model(&model.meta.id, model.meta.name.as_deref());
            }
            for asset in library.blocks.iter().flat_map(|b| &b.definitions) {
                let meta = asset.meta();
                let names = std::iter::once(meta.id.clone()).chain(meta.name.clone());
                match asset {
                    ComputableAsset::Fact(_) => visible.facts.extend(names),
                    ComputableAsset::Rule(_) | ComputableAsset::Protocol(_) => {
                        visible.rules.extend(names)
                    }
                    ComputableAsset::Model(_) => visible.insert_model(&meta.id, meta.name.as_deref()),
                }
            }
        }
        visible
    }

    fn insert_model(&mut self, id: &str, name: Option<&str>) {
        self.models.insert(id.to_string());
        if let Some(name) = name {
            self.models.insert(name.to_string());
        }
    }
}

/// Validate a scoped library set
pub fn validate_libraries(libraries: &[Arc<Library>]) -> Vec<ValidationIssue> {
    let visible = Visible::collect(libraries);
    let mut walker = Walker {
        visible: &visible,
        issues: Vec::new(),
    };
    for library in libraries {
        walker.library(library);
    }
    walker.issues
}

struct Walker<'a> {
    visible: &'a Visible,
    issues: Vec<ValidationIssue>,
}

impl Walker<'_> {
    fn report(&mut self, severity: Severity, owner: &DefinitionRef, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity,
            definition: owner.clone(),
            message: message.into(),
        });
    }

    fn library(&mut self, library: &Library) {
        let owner = library.reference();
        if library.blocks.is_empty() {
            self.report(Severity::Info, &owner, "library has no logic blocks");
        }
        let mut seen = HashSet::new();
        for asset in library.blocks.iter().flat_map(|b| &b.definitions) {
            if !seen.insert((asset.reference().kind, asset.meta().id.clone())) {
                self.report(
                    Severity::Warning,
                    &asset.reference(),
                    "duplicate id; the first definition wins",
                );
            }
        }
        for block in &library.blocks {
            let block_ref = block.reference();
            if block.definitions.is_empty() {
                self.report(Severity::Info, &block_ref, "logic block has no definitions");
            }
            if let Some(guard) = &block.when {
                self.expression(&block_ref, "when", guard);
            }
            for asset in &block.definitions {
                match asset {
                    ComputableAsset::Fact(fact) => self.fact(fact),
                    ComputableAsset::Rule(rule) => self.rule(rule, &rule.reference()),
                    ComputableAsset::Protocol(protocol) => {
                        let owner = protocol.reference();
                        if protocol.scopes.is_empty() {
                            self.report(
                                Severity::Info,
                                &owner,
                                "protocol has no scopes and only runs unscoped",
                            );
                        }
                        self.rule(&protocol.rule, &owner);
                    }
                    ComputableAsset::Model(_) => {}
                }
            }
        }
    }

    fn fact(&mut self, fact: &Fact) {
        let owner = fact.reference();
        self.expression(&owner, "computation", &fact.computation);
        for (i, entry) in fact.normalize.iter().enumerate() {
            self.expression(&owner, &format!("normalize[{}].when", i), &entry.when);
            self.expression(&owner, &format!("normalize[{}].emit", i), &entry.emit);
        }
    }

    fn rule(&mut self, rule: &Rule, owner: &DefinitionRef) {
        if let Some(guard) = &rule.when {
            self.expression(owner, "when", guard);
        }
        if rule.then.is_empty() {
            self.report(Severity::Warning, owner, "rule has no actions");
        }
        self.actions(owner, &rule.then);
    }

    fn actions(&mut self, owner: &DefinitionRef, collection: &ActionCollection) {
        for action in &collection.actions {
            self.action(owner, action);
        }
    }

    fn action(&mut self, owner: &DefinitionRef, action: &Action) {
        match action {
            Action::Actions(collection) => self.actions(owner, collection),
            Action::Propose(propose) => self.propose(owner, propose),
            Action::Assign(assign) => self.assign(owner, assign),
            Action::Issue(issue) => {
                if issue.text.trim().is_empty() {
                    self.report(Severity::Warning, owner, "issue has no text");
                }
            }
            Action::Repeat(repeat) => {
                if !repeat.is_bounded() {
                    self.report(
                        Severity::Error,
                        owner,
                        "repeat has neither iterations nor until and would never terminate",
                    );
                }
                if repeat.iterations == Some(0) {
                    self.report(Severity::Warning, owner, "repeat with zero iterations never runs");
                }
                if let Some(until) = &repeat.until {
                    self.expression(owner, "until", until);
                }
                self.actions(owner, &repeat.body);
            }
            Action::RuleRef(reference) => {
                if !self.visible.rules.contains(&reference.rule) {
                    self.report(
                        Severity::Error,
                        owner,
                        format!("rule reference '{}' does not resolve", reference.rule),
                    );
                }
            }
            Action::Rule(rule) => self.rule(rule, &rule.reference()),
            Action::Scope(change) => self.expression(owner, "scope", &change.expression),
        }
    }

    fn propose(&mut self, owner: &DefinitionRef, propose: &ProposeAction) {
        match (&propose.model, &propose.model_ref) {
            (None, None) => self.report(Severity::Error, owner, "propose has no model"),
            (_, Some(name)) if !self.visible.models.contains(name) => self.report(
                Severity::Error,
                owner,
                format!("model reference '{}' does not resolve", name),
            ),
            _ => {}
        }
        for assign in &propose.assign {
            self.assign(owner, assign);
        }
    }

    fn assign(&mut self, owner: &DefinitionRef, assign: &AssignAction) {
        if let Err(e) = assign.target_path() {
            self.report(Severity::Error, owner, format!("assign path: {}", e));
        }
        match (&assign.expression, &assign.value) {
            (Some(expression), _) => self.expression(owner, "assign", expression),
            (None, None) => self.report(
                Severity::Warning,
                owner,
                format!("assign to '{}' has no value and writes null", assign.path),
            ),
            (None, Some(_)) => {}
        }
    }

    /// Compile the node and check fact references beneath it
    fn expression(&mut self, owner: &DefinitionRef, role: &str, node: &ExpressionNode) {
        if let Err(e) = node.compiled() {
            self.report(Severity::Error, owner, format!("{} does not compile: {}", role, e));
        }
        match node.kind() {
            ExpressionKind::FactRef { fact } if !self.visible.facts.contains(fact) => self.report(
                Severity::Error,
                owner,
                format!("{} references unknown fact '{}'", role, fact),
            ),
            kind => {
                if let Some((_, children)) = kind.aggregate() {
                    for child in children {
                        self.expression(owner, role, child);
                    }
                }
            }
        }
    }
}
