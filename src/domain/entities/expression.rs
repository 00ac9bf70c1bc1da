//! Expression nodes
//!
//! Each node produces one executable form, compiled on first use and cached
//! on the node for its lifetime (see `ExpressionNode::compiled`).

use std::sync::OnceLock;

use serde::{Deserialize, Deserializer};

use super::expr_tree::ExprTree;
use crate::domain::services::CompiledExpression;
use crate::error::CompileError;

/// Which object a query expression resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScopeSelector {
    /// The current frame's scoped object
    #[default]
    Current,
    /// The execution context's subject
    Context,
}

/// Reduction applied to the matches of a structured query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    First,
    Last,
    Single,
    Sum,
    #[serde(alias = "average")]
    Avg,
}

/// Select-filter-order-project-reduce over a collection on the scope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    /// Path of the source collection
    pub source: String,
    /// Filter in query syntax (`status=active&dose=<3`)
    #[serde(default, rename = "where")]
    pub filter: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub descending: bool,
    /// Projection path applied to each match
    #[serde(default)]
    pub select: Option<String>,
    #[serde(default)]
    pub reduce: Option<Reducer>,
    #[serde(default)]
    pub scope: ScopeSelector,
}

impl StructuredQuery {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filter: None,
            order_by: None,
            descending: false,
            select: None,
            reduce: None,
            scope: ScopeSelector::Current,
        }
    }

    /// Builder: set the filter
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Builder: order by a path
    pub fn order_by(mut self, path: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(path.into());
        self.descending = descending;
        self
    }

    /// Builder: project each match
    pub fn select(mut self, path: impl Into<String>) -> Self {
        self.select = Some(path.into());
        self
    }

    /// Builder: set the reducer
    pub fn reduce(mut self, reducer: Reducer) -> Self {
        self.reduce = Some(reducer);
        self
    }
}

/// Boolean combinator of an aggregate expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    All,
    Any,
    None,
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateOp::All => write!(f, "all"),
            AggregateOp::Any => write!(f, "any"),
            AggregateOp::None => write!(f, "none"),
        }
    }
}

/// The variants of an expression node
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExpressionKind {
    /// Source text in the rule expression language
    #[serde(alias = "csharp", alias = "expression")]
    Snippet { source: String },

    /// Path selector or filter predicate
    #[serde(alias = "hdsi")]
    Query {
        expression: String,
        #[serde(default)]
        scope: ScopeSelector,
    },

    /// Pre-built structural tree
    Tree { tree: ExprTree },

    #[serde(rename = "all")]
    AllOf { expressions: Vec<ExpressionNode> },

    #[serde(rename = "any")]
    AnyOf { expressions: Vec<ExpressionNode> },

    #[serde(rename = "none")]
    NoneOf { expressions: Vec<ExpressionNode> },

    /// Lazy reference to a named fact
    #[serde(rename = "fact")]
    FactRef { fact: String },

    #[serde(rename = "select")]
    Select(StructuredQuery),
}

impl ExpressionKind {
    /// Operator and children of an aggregate
    pub fn aggregate(&self) -> Option<(AggregateOp, &[ExpressionNode])> {
        match self {
            ExpressionKind::AllOf { expressions } => Some((AggregateOp::All, expressions)),
            ExpressionKind::AnyOf { expressions } => Some((AggregateOp::Any, expressions)),
            ExpressionKind::NoneOf { expressions } => Some((AggregateOp::None, expressions)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExpressionKind::Snippet { .. } => "snippet",
            ExpressionKind::Query { .. } => "query",
            ExpressionKind::Tree { .. } => "tree",
            ExpressionKind::AllOf { .. } => "all",
            ExpressionKind::AnyOf { .. } => "any",
            ExpressionKind::NoneOf { .. } => "none",
            ExpressionKind::FactRef { .. } => "fact",
            ExpressionKind::Select(_) => "select",
        }
    }
}

/// An expression definition plus its single-assignment compiled delegate
#[derive(Debug, Clone)]
pub struct ExpressionNode {
    kind: ExpressionKind,
    pub(crate) compiled: OnceLock<Result<CompiledExpression, CompileError>>,
}

impl ExpressionNode {
    pub fn new(kind: ExpressionKind) -> Self {
        Self {
            kind,
            compiled: OnceLock::new(),
        }
    }

    pub fn snippet(source: impl Into<String>) -> Self {
        Self::new(ExpressionKind::Snippet {
            source: source.into(),
        })
    }

    pub fn query(expression: impl Into<String>, scope: ScopeSelector) -> Self {
        Self::new(ExpressionKind::Query {
            expression: expression.into(),
            scope,
        })
    }

    pub fn tree(tree: ExprTree) -> Self {
        Self::new(ExpressionKind::Tree { tree })
    }

    pub fn all(expressions: Vec<ExpressionNode>) -> Self {
        Self::new(ExpressionKind::AllOf { expressions })
    }

    pub fn any(expressions: Vec<ExpressionNode>) -> Self {
        Self::new(ExpressionKind::AnyOf { expressions })
    }

    pub fn none(expressions: Vec<ExpressionNode>) -> Self {
        Self::new(ExpressionKind::NoneOf { expressions })
    }

    pub fn fact(name: impl Into<String>) -> Self {
        Self::new(ExpressionKind::FactRef { fact: name.into() })
    }

    pub fn select(query: StructuredQuery) -> Self {
        Self::new(ExpressionKind::Select(query))
    }

    pub fn kind(&self) -> &ExpressionKind {
        &self.kind
    }

    /// Returns true once the delegate has been built
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }
}

/// Library documents may write a snippet as a bare string
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpressionRepr {
    Text(String),
    Kind(ExpressionKind),
}

impl<'de> Deserialize<'de> for ExpressionNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match ExpressionRepr::deserialize(deserializer)? {
            ExpressionRepr::Text(source) => Ok(ExpressionNode::snippet(source)),
            ExpressionRepr::Kind(kind) => Ok(ExpressionNode::new(kind)),
        }
    }
}
