//! Action executor
//!
//! Interprets action nodes against the current frame. Actions mutate the
//! execution context (proposals, issues, variables) and the scoped objects
//! of their frames; they never wrap errors themselves, the enclosing rule
//! or protocol does.

use serde_json::{json, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{query, snippet};
use crate::domain::entities::{
    Action, ActionCollection, AssignAction, Attribution, ExprTree, ExpressionKind, ExpressionNode,
    ProposeAction, Proposal, RaiseIssueAction, RepeatAction, RuleReference, ScopeChangeAction,
    ScopeSelector, TreeParameter,
};
use crate::domain::execution::{scope_of, ExecutionContext, ExecutionMode, FrameOwner, RuleTarget};
use crate::domain::policies::{decide_write, WriteDecision};
use crate::domain::ports::ExecutionEvent;
use crate::domain::value_objects::{DetectedIssue, ObjectPath, PathSegment};
use crate::error::{EngineError, EngineResult};

impl ActionCollection {
    /// Run every action in order inside a collection frame
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        let _frame = ctx.enter_child(FrameOwner::Actions)?;
        for action in &self.actions {
            action.execute(ctx)?;
        }
        Ok(())
    }
}

impl Action {
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        trace!(action = self.label(), "execute action");
        match self {
            Action::Actions(collection) => collection.execute(ctx),
            Action::Propose(propose) => propose.execute(ctx),
            Action::Assign(assign) => assign.execute(ctx),
            Action::Issue(issue) => issue.execute(ctx),
            Action::Repeat(repeat) => repeat.execute(ctx),
            Action::RuleRef(reference) => reference.execute(ctx),
            Action::Rule(rule) => rule.compute(ctx).map(|_| ()),
            Action::Scope(change) => change.execute(ctx),
        }
    }
}

impl AssignAction {
    /// Write the computed or literal value at the path on the scoped object
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        let path = self.target_path()?;
        let value = match (&self.expression, &self.value) {
            (Some(expression), _) => expression.evaluate(ctx, None)?,
            (None, Some(literal)) => literal.clone(),
            (None, None) => Value::Null,
        };
        let scope = ctx.current_scope()?;
        let decision = {
            let current = scope.borrow();
            decide_write(self.overwrite, ctx.accessor().get(&current, path))
        };
        let skipped = decision == WriteDecision::Keep;
        if !skipped {
            ctx.accessor().set(&mut scope.borrow_mut(), path, value.clone())?;
            ctx.touch();
        }
        ctx.notify(|| ExecutionEvent::PropertyAssigned {
            path: path.to_string(),
            value,
            skipped,
        });
        Ok(())
    }
}

impl ProposeAction {
    /// Build a fresh model from the template, attribute it and push it
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        let settings = ctx.settings();
        let accessor = ctx.accessor();
        let mut model = match (&self.model_ref, &self.model) {
            (Some(name), _) => accessor.deep_copy(&ctx.model(name)?.model),
            (None, Some(template)) => accessor.deep_copy(template),
            (None, None) => {
                return Err(EngineError::TypeMismatch {
                    operation: "propose".to_string(),
                    expected: "model or modelRef".to_string(),
                    found: "nothing".to_string(),
                })
            }
        };

        let id = Uuid::new_v4();
        let attribution = attribution(ctx);
        let protocols = if attribution.protocol.is_some() {
            json!([serde_json::to_value(&attribution)?])
        } else {
            json!([])
        };
        accessor.set(&mut model, &key_path(&settings.protocols_key), protocols)?;
        accessor.set(&mut model, &key_path(&settings.id_key), Value::String(id.to_string()))?;

        let scope = scope_of(model);
        // A fresh scope may reuse a freed allocation; keep memo keys distinct
        ctx.touch();
        {
            let _frame = ctx.enter_child_with_scope(FrameOwner::Propose, scope.clone())?;
            for assign in &self.assign {
                assign.execute(ctx)?;
            }
        }
        let model = scope.borrow().clone();

        if let Some(path) = &settings.proposal_backlink {
            let subject = ctx.subject();
            let mut subject = subject.borrow_mut();
            let mut items = match accessor.get(&subject, path) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            items.push(model.clone());
            accessor.set(&mut subject, path, Value::Array(items))?;
            drop(subject);
            ctx.touch();
        }

        let source = ctx.find_frame(|f| f.owner().is_asset().then(|| f.owner().reference()));
        ctx.push_proposal(Proposal {
            id,
            model,
            attribution,
            source,
        });
        Ok(())
    }
}

fn key_path(key: &str) -> ObjectPath {
    ObjectPath::root().child(PathSegment::new(key))
}

/// Nearest repeat supplies the sequence, nearest protocol the identity
fn attribution(ctx: &ExecutionContext) -> Attribution {
    let sequence = ctx.find_frame(|f| match f.owner() {
        FrameOwner::Repeat { iteration_variable } => f.variable(iteration_variable).and_then(Value::as_i64),
        _ => None,
    });
    let mut attribution = ctx
        .find_frame(|f| match f.owner() {
            FrameOwner::Protocol {
                reference,
                name,
                version,
                oid,
            } => Some(Attribution {
                protocol: Some(reference.id.clone()),
                protocol_name: name.clone(),
                version: version.clone(),
                oid: oid.clone(),
                sequence: None,
            }),
            _ => None,
        })
        .unwrap_or_default();
    attribution.sequence = sequence;
    attribution
}

impl RaiseIssueAction {
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        let subject = {
            let scope = ctx.current_scope()?;
            let scope = scope.borrow();
            ctx.accessor().id_of(&scope)
        };
        let protocol = ctx.find_frame(|f| match f.owner() {
            FrameOwner::Protocol { reference, .. } => Some(reference.id.clone()),
            _ => None,
        });
        ctx.push_issue(
            DetectedIssue::new(self.priority, self.issue_type.clone(), self.text.clone())
                .with_subject(subject)
                .with_protocol(protocol),
        );
        Ok(())
    }
}

impl RepeatAction {
    /// Loop the body, publishing the counter; the variable is restored on exit
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        let _frame = ctx.enter_child(FrameOwner::Repeat {
            iteration_variable: self.iteration_variable.clone(),
        })?;
        let shadowed = ctx.remove_variable(&self.iteration_variable);
        let result = self.iterate(ctx);
        match shadowed {
            Some(previous) => ctx.set_variable(self.iteration_variable.clone(), previous),
            None => {
                ctx.remove_variable(&self.iteration_variable);
            }
        }
        result
    }

    fn iterate(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        let limit = ctx.settings().max_iterations;
        let mut counter: u32 = 0;
        loop {
            match self.iterations {
                Some(iterations) if counter >= iterations => break,
                None if counter >= limit => return Err(EngineError::RepeatLimit { limit }),
                _ => {}
            }
            ctx.set_frame_variable(self.iteration_variable.clone(), Value::from(counter))?;
            ctx.set_variable(self.iteration_variable.clone(), Value::from(counter));
            self.body.execute(ctx)?;
            counter += 1;
            if let Some(until) = &self.until {
                if until.evaluate_bool(ctx, "until", None)? {
                    break;
                }
            }
        }
        debug!(variable = %self.iteration_variable, iterations = counter, "repeat finished");
        Ok(())
    }
}

impl RuleReference {
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        match ctx.rule(&self.rule)? {
            RuleTarget::Rule(rule) => {
                rule.compute(ctx)?;
            }
            RuleTarget::Protocol(protocol) if ctx.mode() == ExecutionMode::Execute => {
                protocol.compute(ctx)?;
            }
            RuleTarget::Protocol(_) => {
                debug!(protocol = %self.rule, "protocol reference skipped in analyze mode");
            }
        }
        Ok(())
    }
}

impl ScopeChangeAction {
    /// Replace the current frame's scoped object with the expression result
    ///
    /// A plain member path off the scoped object keeps the new scope tied
    /// to the place it came from, so writes in the frame reach the subject.
    /// Any other expression yields a detached scope.
    pub fn execute(&self, ctx: &ExecutionContext) -> EngineResult<()> {
        let scope = scope_of(self.expression.evaluate(ctx, None)?);
        match addressed_path(&self.expression) {
            Some(path) => ctx.replace_scope_at(path, scope),
            None => ctx.replace_scope(scope),
        }
    }
}

/// The path an expression reads off the current scope, when that is all it does
fn addressed_path(expression: &ExpressionNode) -> Option<ObjectPath> {
    match expression.kind() {
        ExpressionKind::Snippet { source } => tree_path(&snippet::parse(source).ok()?),
        ExpressionKind::Tree { tree } => tree_path(tree),
        ExpressionKind::Query {
            expression,
            scope: ScopeSelector::Current,
        } if !query::is_filter(expression) => ObjectPath::parse(expression).ok(),
        _ => None,
    }
}

fn tree_path(tree: &ExprTree) -> Option<ObjectPath> {
    match tree {
        ExprTree::Parameter {
            name: TreeParameter::Scope,
        } => Some(ObjectPath::root()),
        ExprTree::Member { target, member } => {
            Some(tree_path(target)?.child(PathSegment::new(member.clone())))
        }
        ExprTree::Index { target, index } => {
            let ExprTree::Constant { value } = index.as_ref() else {
                return None;
            };
            let path = tree_path(target)?;
            match value {
                Value::String(key) => Some(path.child(PathSegment::new(key.clone()))),
                Value::Number(n) => {
                    let index = n.as_u64()?;
                    let (parent, last) = path.split_last()?;
                    if last.guard.is_some() {
                        return None;
                    }
                    Some(parent.child(PathSegment {
                        name: last.name.clone(),
                        guard: Some(index.to_string()),
                    }))
                }
                _ => None,
            }
        }
        _ => None,
    }
}
