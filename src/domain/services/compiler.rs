//! Expression compiler
//!
//! Lowers every [`ExpressionKind`] into a [`CompiledExpression`]: a shared
//! closure over an [`Env`] (execution context, scoped object, optional
//! emitted value). Snippets are parsed into an [`ExprTree`] first, so host
//! trees and snippet text share one code generator.
//!
//! Compilation happens once per node and is cached on the node through its
//! `OnceLock`; concurrent first use compiles at most once per winner and
//! every caller observes the same delegate.
//!
//! Member chains rooted at `scopedObject`, `value`, a lambda parameter or
//! `context.Target` navigate the borrowed model and clone only the final
//! value.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use super::builtins::{self, Selector};
use super::query::{collapse, CompiledQuery, QueryFilter};
use super::snippet;
use crate::domain::entities::{
    AggregateOp, BinaryOp, ExprTree, ExpressionKind, ExpressionNode, Reducer, ScopeSelector,
    StructuredQuery, TreeParameter, UnaryOp,
};
use crate::domain::execution::ExecutionContext;
use crate::domain::ports::PathAccessor;
use crate::domain::value_objects::ObjectPath;
use crate::error::{CompileError, EngineError, EngineResult};

static NULL: Value = Value::Null;

type Evaluator = dyn Fn(&Env<'_>) -> EngineResult<Value> + Send + Sync;

/// Executable form of an expression node
#[derive(Clone)]
pub struct CompiledExpression {
    eval: Arc<Evaluator>,
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledExpression(..)")
    }
}

impl CompiledExpression {
    fn new(eval: impl Fn(&Env<'_>) -> EngineResult<Value> + Send + Sync + 'static) -> Self {
        Self {
            eval: Arc::new(eval),
        }
    }

    fn constant(value: Value) -> Self {
        Self::new(move |_| Ok(value.clone()))
    }

    pub fn call(&self, env: &Env<'_>) -> EngineResult<Value> {
        (self.eval)(env)
    }
}

/// Lambda parameters bound by enclosing method calls, innermost first
struct Locals<'a> {
    value: &'a Value,
    parent: Option<&'a Locals<'a>>,
}

/// What a compiled expression is evaluated against
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub ctx: &'a ExecutionContext,
    pub scope: &'a Value,
    pub value: Option<&'a Value>,
    locals: Option<&'a Locals<'a>>,
}

impl<'a> Env<'a> {
    pub fn new(ctx: &'a ExecutionContext, scope: &'a Value, value: Option<&'a Value>) -> Self {
        Self {
            ctx,
            scope,
            value,
            locals: None,
        }
    }

    fn local(&self, depth: usize) -> &'a Value {
        let mut frame = self.locals;
        for _ in 0..depth {
            frame = frame.and_then(|l| l.parent);
        }
        frame.map(|l| l.value).unwrap_or(&NULL)
    }
}

/// Compile an expression node's kind
pub fn compile(kind: &ExpressionKind) -> Result<CompiledExpression, CompileError> {
    match kind {
        ExpressionKind::Snippet { source } => {
            let tree = snippet::parse(source)?;
            TreeCompiler::new(source).compile(&tree)
        }
        ExpressionKind::Tree { tree } => TreeCompiler::new("<tree>").compile(tree),
        ExpressionKind::Query { expression, scope } => compile_query(expression, *scope),
        ExpressionKind::AllOf { expressions } => compile_aggregate(AggregateOp::All, expressions),
        ExpressionKind::AnyOf { expressions } => compile_aggregate(AggregateOp::Any, expressions),
        ExpressionKind::NoneOf { expressions } => compile_aggregate(AggregateOp::None, expressions),
        ExpressionKind::FactRef { fact } => {
            let name = fact.clone();
            Ok(CompiledExpression::new(move |env| {
                env.ctx.fact(&name)?.compute(env.ctx)
            }))
        }
        ExpressionKind::Select(query) => compile_select(query),
    }
}

impl ExpressionNode {
    /// The node's delegate, compiled on first use
    pub fn compiled(&self) -> Result<&CompiledExpression, CompileError> {
        self.compiled
            .get_or_init(|| compile(self.kind()))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Evaluate against the current frame's scoped object
    pub fn evaluate(&self, ctx: &ExecutionContext, value: Option<&Value>) -> EngineResult<Value> {
        let compiled = self.compiled()?;
        let scope = ctx.current_scope()?;
        let scope = scope.borrow();
        compiled.call(&Env::new(ctx, &scope, value))
    }

    /// Evaluate against an explicit scoped object
    pub fn evaluate_against(
        &self,
        ctx: &ExecutionContext,
        scope: &Value,
        value: Option<&Value>,
    ) -> EngineResult<Value> {
        self.compiled()?.call(&Env::new(ctx, scope, value))
    }

    /// Evaluate as a guard; null counts as false
    pub fn evaluate_bool(
        &self,
        ctx: &ExecutionContext,
        operation: &str,
        value: Option<&Value>,
    ) -> EngineResult<bool> {
        builtins::as_bool(operation, &self.evaluate(ctx, value)?)
    }
}

// ----------------------------------------------------------------------
// Queries
// ----------------------------------------------------------------------

fn compile_query(text: &str, scope: ScopeSelector) -> Result<CompiledExpression, CompileError> {
    let query = CompiledQuery::parse(text)?;
    Ok(match scope {
        ScopeSelector::Current => {
            CompiledExpression::new(move |env| Ok(query.evaluate(env.ctx.accessor(), env.scope)))
        }
        ScopeSelector::Context => CompiledExpression::new(move |env| {
            let subject = env.ctx.subject().borrow();
            Ok(query.evaluate(env.ctx.accessor(), &subject))
        }),
    })
}

struct SelectPlan {
    source: ObjectPath,
    filter: Option<QueryFilter>,
    order_by: Option<ObjectPath>,
    descending: bool,
    projection: Option<ObjectPath>,
    reduce: Option<Reducer>,
    scope: ScopeSelector,
}

fn compile_select(query: &StructuredQuery) -> Result<CompiledExpression, CompileError> {
    let optional_path = |text: &Option<String>| text.as_deref().map(ObjectPath::parse).transpose();
    let plan = SelectPlan {
        source: ObjectPath::parse(&query.source)?,
        filter: query.filter.as_deref().map(QueryFilter::parse).transpose()?,
        order_by: optional_path(&query.order_by)?,
        descending: query.descending,
        projection: optional_path(&query.select)?,
        reduce: query.reduce,
        scope: query.scope,
    };
    let label = query.source.clone();
    Ok(CompiledExpression::new(move |env| match plan.scope {
        ScopeSelector::Current => plan.run(env.ctx.accessor(), env.scope, &label),
        ScopeSelector::Context => {
            let subject = env.ctx.subject().borrow();
            plan.run(env.ctx.accessor(), &subject, &label)
        }
    }))
}

impl SelectPlan {
    fn run(&self, accessor: &dyn PathAccessor, root: &Value, label: &str) -> EngineResult<Value> {
        let mut matches = accessor.select(root, &self.source);
        if let Some(filter) = &self.filter {
            matches.retain(|item| filter.matches(accessor, item));
        }
        if let Some(order) = &self.order_by {
            let key = |item: &Value| collapse(accessor.select(item, order));
            matches.sort_by(|a, b| {
                let (ka, kb) = (key(a), key(b));
                match (ka.is_null(), kb.is_null(), self.descending) {
                    (false, false, true) => builtins::sort_order(&kb, &ka),
                    _ => builtins::sort_order(&ka, &kb),
                }
            });
        }
        let values: Vec<Value> = match &self.projection {
            Some(path) => matches
                .into_iter()
                .map(|item| collapse(accessor.select(item, path)))
                .collect(),
            None => matches.into_iter().cloned().collect(),
        };
        reduce(self.reduce, values, label)
    }
}

fn numeric(values: &[Value], operation: &str) -> EngineResult<Vec<f64>> {
    values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| builtins::as_f64(v).ok_or_else(|| EngineError::type_mismatch(operation, "number", v)))
        .collect()
}

fn reduce(reducer: Option<Reducer>, values: Vec<Value>, label: &str) -> EngineResult<Value> {
    match reducer {
        None | Some(Reducer::First) => Ok(values.into_iter().next().unwrap_or(Value::Null)),
        Some(Reducer::Last) => Ok(values.into_iter().last().unwrap_or(Value::Null)),
        Some(Reducer::Single) => {
            if values.len() > 1 {
                return Err(EngineError::Query {
                    query: label.to_string(),
                    message: format!("single expected one match, found {}", values.len()),
                });
            }
            Ok(values.into_iter().next().unwrap_or(Value::Null))
        }
        Some(Reducer::Sum) => Ok(builtins::number(numeric(&values, "sum")?.iter().sum())),
        Some(Reducer::Avg) => {
            let numbers = numeric(&values, "avg")?;
            if numbers.is_empty() {
                return Ok(Value::Null);
            }
            Ok(builtins::number(numbers.iter().sum::<f64>() / numbers.len() as f64))
        }
    }
}

// ----------------------------------------------------------------------
// Aggregates
// ----------------------------------------------------------------------

fn compile_aggregate(
    op: AggregateOp,
    children: &[ExpressionNode],
) -> Result<CompiledExpression, CompileError> {
    if children.is_empty() {
        return Err(CompileError::new(op.to_string(), 0, format!("`{}` aggregate has no expressions", op)));
    }
    let children = children
        .iter()
        .map(|child| child.compiled().cloned())
        .collect::<Result<Vec<_>, _>>()?;
    let operation = op.to_string();
    Ok(CompiledExpression::new(move |env| {
        for child in &children {
            let holds = match child.call(env)? {
                Value::Null => false,
                Value::Bool(b) => b,
                other => return Err(EngineError::type_mismatch(operation.as_str(), "boolean", &other)),
            };
            match (op, holds) {
                (AggregateOp::All, false) => return Ok(Value::Bool(false)),
                (AggregateOp::Any, true) => return Ok(Value::Bool(true)),
                (AggregateOp::None, true) => return Ok(Value::Bool(false)),
                _ => {}
            }
        }
        Ok(Value::Bool(!matches!(op, AggregateOp::Any)))
    }))
}

// ----------------------------------------------------------------------
// Trees
// ----------------------------------------------------------------------

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '@')
}

/// Where a member chain starts
enum Root {
    Scope,
    Value,
    Local(usize),
    Target,
    Expr(CompiledExpression),
}

enum Step {
    Member(String),
    Index(CompiledExpression),
}

struct TreeCompiler<'t> {
    text: &'t str,
    /// Lambda parameters in scope, outermost first
    locals: Vec<String>,
}

impl<'t> TreeCompiler<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            text,
            locals: Vec::new(),
        }
    }

    /// Error positioned at the first use of `name` followed by `after`;
    /// `method` selects uses preceded by `.` / `?.`
    fn error_at(
        &self,
        name: &str,
        method: bool,
        after: &str,
        message: impl Into<String>,
    ) -> CompileError {
        let position = self
            .text
            .match_indices(name)
            .map(|(i, _)| i)
            .find(|&i| {
                let before = self.text[..i].trim_end();
                let rest = self.text[i + name.len()..].trim_start_matches([' ', ')']);
                let detached = !before.ends_with(is_ident_char);
                detached && before.ends_with('.') == method && rest.starts_with(after)
            })
            .unwrap_or(0);
        CompileError::new(self.text, position, message)
    }

    fn compile(&mut self, tree: &ExprTree) -> Result<CompiledExpression, CompileError> {
        match tree {
            ExprTree::Constant { value } => Ok(CompiledExpression::constant(value.clone())),
            ExprTree::Parameter { .. } | ExprTree::Member { .. } | ExprTree::Index { .. } => {
                self.compile_chain(tree)
            }
            ExprTree::Variable { name } => Ok(self.variable(name)),
            ExprTree::Unary { op, operand } => {
                let operand = self.compile(operand)?;
                Ok(match op {
                    UnaryOp::Not => CompiledExpression::new(move |env| {
                        Ok(Value::Bool(!builtins::as_bool("!", &operand.call(env)?)?))
                    }),
                    UnaryOp::Negate => {
                        CompiledExpression::new(move |env| builtins::negate(&operand.call(env)?))
                    }
                })
            }
            ExprTree::Binary { op, left, right } => {
                let (left, right) = (self.compile(left)?, self.compile(right)?);
                Ok(compile_binary(*op, left, right))
            }
            ExprTree::Conditional {
                test,
                then,
                otherwise,
            } => {
                let test = self.compile(test)?;
                let then = self.compile(then)?;
                let otherwise = self.compile(otherwise)?;
                Ok(CompiledExpression::new(move |env| {
                    if builtins::as_bool("?:", &test.call(env)?)? {
                        then.call(env)
                    } else {
                        otherwise.call(env)
                    }
                }))
            }
            ExprTree::Call { function, args } => self.compile_call(function, args),
            ExprTree::Method {
                target,
                method,
                args,
            } => self.compile_method(target, method, args),
            ExprTree::Lambda { parameter, .. } => Err(self.error_at(
                parameter,
                false,
                "=>",
                format!("lambda '{}' is only valid as a method argument", parameter),
            )),
        }
    }

    fn variable(&self, name: &str) -> CompiledExpression {
        if let Some(depth) = self.locals.iter().rev().position(|l| l == name) {
            return CompiledExpression::new(move |env| Ok(env.local(depth).clone()));
        }
        let name = name.to_string();
        CompiledExpression::new(move |env| {
            env.ctx
                .variable(&name)
                .ok_or_else(|| EngineError::UnknownVariable(name.clone()))
        })
    }

    fn compile_chain(&mut self, tree: &ExprTree) -> Result<CompiledExpression, CompileError> {
        let mut steps = Vec::new();
        let mut cursor = tree;
        loop {
            match cursor {
                ExprTree::Member { target, member } => {
                    steps.push(Step::Member(member.clone()));
                    cursor = target;
                }
                ExprTree::Index { target, index } => {
                    steps.push(Step::Index(self.compile(index)?));
                    cursor = target;
                }
                _ => break,
            }
        }
        steps.reverse();

        let root = match cursor {
            ExprTree::Parameter {
                name: TreeParameter::Scope,
            } => Root::Scope,
            ExprTree::Parameter {
                name: TreeParameter::Value,
            } => Root::Value,
            ExprTree::Parameter {
                name: TreeParameter::Context,
            } => match steps.first() {
                Some(Step::Member(member)) => {
                    let member = member.clone();
                    steps.remove(0);
                    if member.eq_ignore_ascii_case("Target") {
                        Root::Target
                    } else {
                        Root::Expr(context_member(member))
                    }
                }
                _ => Root::Expr(CompiledExpression::new(|env| {
                    Ok(json!({
                        "Target": env.ctx.subject().borrow().clone(),
                        "Mode": env.ctx.mode().to_string(),
                    }))
                })),
            },
            ExprTree::Variable { name } => {
                match self.locals.iter().rev().position(|l| l == name) {
                    Some(depth) => Root::Local(depth),
                    None => Root::Expr(self.variable(name)),
                }
            }
            other => Root::Expr(self.compile(other)?),
        };

        Ok(CompiledExpression::new(move |env| match &root {
            Root::Scope => navigate(env, env.scope, &steps),
            Root::Value => navigate(env, env.value.unwrap_or(&NULL), &steps),
            Root::Local(depth) => navigate(env, env.local(*depth), &steps),
            Root::Target => {
                let subject = env.ctx.subject().borrow();
                navigate(env, &subject, &steps)
            }
            Root::Expr(expr) => {
                let start = expr.call(env)?;
                navigate(env, &start, &steps)
            }
        }))
    }

    fn compile_call(
        &mut self,
        function: &str,
        args: &[ExprTree],
    ) -> Result<CompiledExpression, CompileError> {
        let Some(canonical) = builtins::canonical_function(function) else {
            return Err(self.error_at(
                function,
                false,
                "(",
                format!("unknown function '{}'", function),
            ));
        };
        if canonical == "fact" {
            return match args {
                [ExprTree::Constant {
                    value: Value::String(name),
                }] => {
                    let name = name.clone();
                    Ok(CompiledExpression::new(move |env| {
                        env.ctx.fact(&name)?.compute(env.ctx)
                    }))
                }
                [name] => {
                    let name = self.compile(name)?;
                    Ok(CompiledExpression::new(move |env| {
                        let name = builtins::display(&name.call(env)?);
                        env.ctx.fact(&name)?.compute(env.ctx)
                    }))
                }
                _ => Err(self.error_at(function, false, "(", "fact() takes exactly one argument")),
            };
        }
        let args = args
            .iter()
            .map(|arg| self.compile(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledExpression::new(move |env| {
            let values = args
                .iter()
                .map(|arg| arg.call(env))
                .collect::<EngineResult<Vec<_>>>()?;
            builtins::call_function(canonical, &values)
        }))
    }

    fn compile_method(
        &mut self,
        target: &ExprTree,
        method: &str,
        args: &[ExprTree],
    ) -> Result<CompiledExpression, CompileError> {
        let Some(canonical) = builtins::canonical_method(method) else {
            return Err(self.error_at(method, true, "(", format!("unknown method '{}'", method)));
        };
        let target = self.compile(target)?;
        let mut lambda = None;
        let mut plain = Vec::new();
        for arg in args {
            match arg {
                ExprTree::Lambda { parameter, body } => {
                    if lambda.is_some() {
                        return Err(self.error_at(
                            method,
                            true,
                            "(",
                            format!("{} accepts a single lambda", canonical),
                        ));
                    }
                    self.locals.push(parameter.clone());
                    let body = self.compile(body);
                    self.locals.pop();
                    lambda = Some(body?);
                }
                other => plain.push(self.compile(other)?),
            }
        }
        Ok(CompiledExpression::new(move |env| {
            let receiver = target.call(env)?;
            let values = plain
                .iter()
                .map(|arg| arg.call(env))
                .collect::<EngineResult<Vec<_>>>()?;
            match &lambda {
                Some(body) => {
                    let select = |item: &Value| -> EngineResult<Value> {
                        let locals = Locals {
                            value: item,
                            parent: env.locals,
                        };
                        body.call(&Env {
                            ctx: env.ctx,
                            scope: env.scope,
                            value: env.value,
                            locals: Some(&locals),
                        })
                    };
                    let selector: Selector<'_> = &select;
                    builtins::call_method(canonical, &receiver, &values, Some(selector))
                }
                None => builtins::call_method(canonical, &receiver, &values, None),
            }
        }))
    }
}

fn context_member(member: String) -> CompiledExpression {
    CompiledExpression::new(move |env| {
        if member.eq_ignore_ascii_case("Mode") {
            return Ok(Value::String(env.ctx.mode().to_string()));
        }
        Ok(env.ctx.variable(&member).unwrap_or(Value::Null))
    })
}

fn compile_binary(op: BinaryOp, left: CompiledExpression, right: CompiledExpression) -> CompiledExpression {
    match op {
        BinaryOp::And => CompiledExpression::new(move |env| {
            if !builtins::as_bool("&&", &left.call(env)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(builtins::as_bool("&&", &right.call(env)?)?))
        }),
        BinaryOp::Or => CompiledExpression::new(move |env| {
            if builtins::as_bool("||", &left.call(env)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(builtins::as_bool("||", &right.call(env)?)?))
        }),
        BinaryOp::Coalesce => CompiledExpression::new(move |env| match left.call(env)? {
            Value::Null => right.call(env),
            present => Ok(present),
        }),
        op => CompiledExpression::new(move |env| {
            builtins::binary(op, &left.call(env)?, &right.call(env)?)
        }),
    }
}

fn navigate(env: &Env<'_>, start: &Value, steps: &[Step]) -> EngineResult<Value> {
    let mut current = Cow::Borrowed(start);
    for step in steps {
        current = match current {
            Cow::Borrowed(value) => apply_step(env, value, step)?,
            Cow::Owned(value) => Cow::Owned(apply_step(env, &value, step)?.into_owned()),
        };
    }
    Ok(current.into_owned())
}

fn apply_step<'v>(env: &Env<'_>, target: &'v Value, step: &Step) -> EngineResult<Cow<'v, Value>> {
    let accessor = env.ctx.accessor();
    match step {
        Step::Member(name) => Ok(member(accessor, target, name)),
        Step::Index(index) => {
            let index = index.call(env)?;
            match (target, &index) {
                (Value::Null, _) => Ok(Cow::Owned(Value::Null)),
                (Value::Array(items), Value::Number(n)) => Ok(n
                    .as_u64()
                    .and_then(|i| items.get(i as usize))
                    .map(Cow::Borrowed)
                    .unwrap_or(Cow::Owned(Value::Null))),
                (_, Value::String(key)) => Ok(member(accessor, target, key)),
                (Value::Object(_), _) => Ok(Cow::Owned(Value::Null)),
                (_, other) => Err(EngineError::type_mismatch("[]", "number or string", other)),
            }
        }
    }
}

fn member<'v>(accessor: &dyn PathAccessor, target: &'v Value, name: &str) -> Cow<'v, Value> {
    if let Some(child) = accessor.member(target, name) {
        return Cow::Borrowed(child);
    }
    Cow::Owned(builtins::builtin_member(target, name).unwrap_or(Value::Null))
}
