//! Action nodes
//!
//! Actions execute rather than return a value. They are interpreted by the
//! action executor against the current stack frame.

use std::sync::OnceLock;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::expression::ExpressionNode;
use super::rule::Rule;
use crate::domain::value_objects::{IssuePriority, ObjectPath};
use crate::error::CompileError;

/// Any action node
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Ordered list of actions, itself an action
    Actions(ActionCollection),
    Propose(ProposeAction),
    Assign(AssignAction),
    #[serde(alias = "raise")]
    Issue(RaiseIssueAction),
    Repeat(RepeatAction),
    /// Execute another rule by id or name
    RuleRef(RuleReference),
    /// A rule defined in place
    Rule(Rule),
    /// Replace the current frame's scoped object
    Scope(ScopeChangeAction),
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Actions(_) => "actions",
            Action::Propose(_) => "propose",
            Action::Assign(_) => "assign",
            Action::Issue(_) => "issue",
            Action::Repeat(_) => "repeat",
            Action::RuleRef(_) => "ruleRef",
            Action::Rule(_) => "rule",
            Action::Scope(_) => "scope",
        }
    }
}

/// Ordered list of actions
#[derive(Debug, Clone, Default)]
pub struct ActionCollection {
    pub actions: Vec<Action>,
}

impl ActionCollection {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Accepts both `[...]` and `{ "actions": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum ActionCollectionDe {
    List(Vec<Action>),
    Table {
        #[serde(default)]
        actions: Vec<Action>,
    },
}

impl<'de> Deserialize<'de> for ActionCollection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match ActionCollectionDe::deserialize(deserializer)? {
            ActionCollectionDe::List(actions) => Ok(Self { actions }),
            ActionCollectionDe::Table { actions } => Ok(Self { actions }),
        }
    }
}

/// Build a new subject model from a template and push it as a proposal
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeAction {
    /// Inline template
    #[serde(default)]
    pub model: Option<Value>,
    /// Id of a shared model defined in a library
    #[serde(default)]
    pub model_ref: Option<String>,
    /// Assignments run against the new model
    #[serde(default)]
    pub assign: Vec<AssignAction>,
}

impl ProposeAction {
    pub fn inline(model: Value) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    pub fn shared(model_ref: impl Into<String>) -> Self {
        Self {
            model_ref: Some(model_ref.into()),
            ..Self::default()
        }
    }

    /// Builder: add an assignment
    pub fn with_assign(mut self, assign: AssignAction) -> Self {
        self.assign.push(assign);
        self
    }
}

/// Write a value at a path on the current scoped object
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignAction {
    pub path: String,
    #[serde(default)]
    pub expression: Option<ExpressionNode>,
    /// Literal used when no expression is given
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    #[serde(skip)]
    parsed_path: OnceLock<Result<ObjectPath, CompileError>>,
}

fn default_overwrite() -> bool {
    true
}

impl AssignAction {
    pub fn literal(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            expression: None,
            value: Some(value.into()),
            overwrite: true,
            parsed_path: OnceLock::new(),
        }
    }

    pub fn computed(path: impl Into<String>, expression: ExpressionNode) -> Self {
        Self {
            path: path.into(),
            expression: Some(expression),
            value: None,
            overwrite: true,
            parsed_path: OnceLock::new(),
        }
    }

    /// Builder: set the overwrite flag
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Destination path, parsed once
    pub fn target_path(&self) -> Result<&ObjectPath, CompileError> {
        self.parsed_path
            .get_or_init(|| ObjectPath::parse(&self.path))
            .as_ref()
            .map_err(Clone::clone)
    }
}

/// Raise a detected issue
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseIssueAction {
    #[serde(default)]
    pub priority: IssuePriority,
    #[serde(default)]
    pub issue_type: String,
    pub text: String,
}

impl RaiseIssueAction {
    pub fn new(priority: IssuePriority, issue_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            priority,
            issue_type: issue_type.into(),
            text: text.into(),
        }
    }
}

/// Loop over a body a fixed number of times and/or until a guard holds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatAction {
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub until: Option<ExpressionNode>,
    #[serde(default = "default_iteration_variable")]
    pub iteration_variable: String,
    #[serde(alias = "then")]
    pub body: ActionCollection,
}

fn default_iteration_variable() -> String {
    "index".to_string()
}

impl RepeatAction {
    pub fn new(body: ActionCollection) -> Self {
        Self {
            iterations: None,
            until: None,
            iteration_variable: default_iteration_variable(),
            body,
        }
    }

    /// Builder: bound the loop by a count
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Builder: stop once `until` holds after an iteration
    pub fn until(mut self, until: ExpressionNode) -> Self {
        self.until = Some(until);
        self
    }

    /// Builder: rename the iteration variable
    pub fn variable(mut self, name: impl Into<String>) -> Self {
        self.iteration_variable = name.into();
        self
    }

    /// A loop needs a count, an until guard, or both
    pub fn is_bounded(&self) -> bool {
        self.iterations.is_some() || self.until.is_some()
    }
}

/// Execute a rule or protocol by id or name
#[derive(Debug, Clone, Deserialize)]
pub struct RuleReference {
    pub rule: String,
}

impl RuleReference {
    pub fn new(rule: impl Into<String>) -> Self {
        Self { rule: rule.into() }
    }
}

/// Recompute the scoped object of the current frame
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeChangeAction {
    pub expression: ExpressionNode,
}
