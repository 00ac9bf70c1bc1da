//! Domain Entities
//!
//! The definition graph: immutable after load, owned by `Library`.
//! - `Library` / `LogicBlock` - containers
//! - `Fact`, `Rule`, `Protocol` - computable assets
//! - `Action` - executable nodes
//! - `ExpressionNode` / `ExprTree` - expressions and their structural form
//! - `Proposal` - output of `propose` actions

mod action;
mod expr_tree;
mod expression;
mod fact;
mod library;
mod proposal;
mod rule;

pub use action::{
    Action, ActionCollection, AssignAction, ProposeAction, RaiseIssueAction, RepeatAction,
    RuleReference, ScopeChangeAction,
};
pub use expr_tree::{BinaryOp, ExprTree, TreeParameter, UnaryOp};
pub use expression::{
    AggregateOp, ExpressionKind, ExpressionNode, Reducer, ScopeSelector, StructuredQuery,
};
pub use fact::{Fact, NormalizeEntry};
pub use library::{ComputableAsset, Library, LibraryReference, LogicBlock, SharedModel};
pub use proposal::{Attribution, EngineOutput, Proposal};
pub use rule::{Protocol, Rule, RuleOutcome};
