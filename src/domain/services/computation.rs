//! Computable assets
//!
//! `Fact::compute`, `Rule::compute` and `Protocol::compute`. Each asset
//! checks its lifecycle, pushes its own frame and wraps any failure once
//! with its identity and the live frame chain.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, trace};

use crate::domain::entities::{Fact, Protocol, Rule, RuleOutcome};
use crate::domain::execution::{ExecutionContext, FrameOwner};
use crate::domain::policies::Admission;
use crate::domain::ports::ExecutionEvent;
use crate::domain::value_objects::DefinitionKind;
use crate::error::{EngineError, EngineResult};

impl Fact {
    /// Compute this fact against the current frame's scoped object
    ///
    /// Results are memoized per (fact, scoped object, state generation):
    /// repeated calls with no intervening mutation return the cached value.
    pub fn compute(&self, ctx: &ExecutionContext) -> EngineResult<Value> {
        if ctx.lifecycle().admit(&self.meta, DefinitionKind::Fact)? == Admission::Skip {
            return Ok(Value::Null);
        }
        let scope = ctx.current_scope()?;
        if let Some(value) = ctx.cached_fact(self, &scope) {
            ctx.notify(|| ExecutionEvent::FactComputed {
                fact: self.reference(),
                value: value.clone(),
                elapsed: Default::default(),
                cached: true,
            });
            return Ok(value);
        }

        let started = Instant::now();
        let _frame = ctx.enter_child(FrameOwner::Fact(self.reference()))?;
        let value = self.evaluate(ctx).map_err(|e| ctx.wrap_error(e))?;
        let elapsed = started.elapsed();
        trace!(fact = %self.meta.id, value = %value, ?elapsed, "fact computed");
        ctx.notify(|| ExecutionEvent::FactComputed {
            fact: self.reference(),
            value: value.clone(),
            elapsed,
            cached: false,
        });
        ctx.cache_fact(self, &scope, value.clone());
        Ok(value)
    }

    /// Evaluate, coerce, negate, then apply the first matching normalizer
    fn evaluate(&self, ctx: &ExecutionContext) -> EngineResult<Value> {
        let raw = self.computation.evaluate(ctx, None)?;
        let mut value = match self.value_type {
            Some(value_type) => value_type.coerce(raw)?,
            None => raw,
        };
        if self.negate {
            value = match value {
                Value::Null => Value::Bool(true),
                Value::Bool(b) => Value::Bool(!b),
                other => return Err(EngineError::type_mismatch("negate", "boolean", &other)),
            };
        }
        for entry in &self.normalize {
            if entry.when.evaluate_bool(ctx, "normalize", Some(&value))? {
                return entry.emit.evaluate(ctx, Some(&value));
            }
        }
        Ok(value)
    }
}

impl Rule {
    /// Run the actions when the guard is absent or true
    pub fn compute(&self, ctx: &ExecutionContext) -> EngineResult<RuleOutcome> {
        if ctx.lifecycle().admit(&self.meta, DefinitionKind::Rule)? == Admission::Skip {
            return Ok(RuleOutcome::NotExecuted);
        }
        let _frame = ctx.enter_child(FrameOwner::rule(self))?;
        self.run(ctx).map_err(|e| ctx.wrap_error(e))
    }

    /// Guard and actions, inside a frame the caller has already pushed
    pub(crate) fn run(&self, ctx: &ExecutionContext) -> EngineResult<RuleOutcome> {
        if let Some(guard) = &self.when {
            if !guard.evaluate_bool(ctx, "when", None)? {
                debug!(rule = %self.meta.id, "guard not satisfied");
                return Ok(RuleOutcome::NotExecuted);
            }
        }
        self.then.execute(ctx)?;
        debug!(rule = %self.meta.id, "rule executed");
        Ok(RuleOutcome::Executed)
    }
}

impl Protocol {
    /// As [`Rule::compute`], with the protocol's identity on the frame
    pub fn compute(&self, ctx: &ExecutionContext) -> EngineResult<RuleOutcome> {
        if ctx.lifecycle().admit(self.meta(), DefinitionKind::Protocol)? == Admission::Skip {
            return Ok(RuleOutcome::NotExecuted);
        }
        let _frame = ctx.enter_child(FrameOwner::protocol(self))?;
        self.rule.run(ctx).map_err(|e| ctx.wrap_error(e))
    }
}
