//! Property tests for fact computation, aggregates and repeats.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use cdss::domain::entities::{
    Action, ActionCollection, ExpressionNode, Fact, LogicBlock, RaiseIssueAction, RepeatAction,
    Rule,
};
use cdss::domain::execution::ExecutionContext;
use cdss::{DecisionEngine, ExecutionParameters, IssuePriority, JsonPathAccessor, Library};

fn context(subject: Value) -> ExecutionContext {
    ExecutionContext::builder(subject, Arc::new(JsonPathAccessor::default())).open()
}

fn literal(flag: bool) -> ExpressionNode {
    ExpressionNode::snippet(if flag { "true" } else { "false" })
}

/// Count the issues raised by a single repeat with the given shape
fn ticks(repeat: RepeatAction) -> usize {
    let rule = Rule::new("ticker").then(Action::Repeat(repeat));
    let library = Library::new("lib").with_block(LogicBlock::new("main", None).with(rule.into()));
    let engine = DecisionEngine::new(vec![Arc::new(library)], Arc::new(JsonPathAccessor::default()));
    engine
        .execute(&json!({}), &ExecutionParameters::new())
        .unwrap()
        .iter()
        .filter(|output| output.as_issue().is_some())
        .count()
}

fn tick_body() -> ActionCollection {
    ActionCollection::new(vec![Action::Issue(RaiseIssueAction::new(
        IssuePriority::Info,
        "tick",
        "tick",
    ))])
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Computing a fact twice without mutation gives the same value.
    #[test]
    fn property_fact_compute_is_stable(age in 0i64..130) {
        let ctx = context(json!({ "age": age }));
        let _root = ctx.enter_root().unwrap();
        let fact = Fact::new("doubled", ExpressionNode::snippet("scopedObject.age * 2 + 1"));

        let first = fact.compute(&ctx).unwrap();
        let second = fact.compute(&ctx).unwrap();

        prop_assert_eq!(&first, &json!(age * 2 + 1));
        prop_assert_eq!(first, second);
    }

    /// PROPERTY: A negated fact inverts booleans and treats null as false.
    #[test]
    fn property_negation_inverts(flag in proptest::option::of(any::<bool>())) {
        let ctx = context(json!({ "flag": flag }));
        let _root = ctx.enter_root().unwrap();
        let fact = Fact::new("notFlag", ExpressionNode::snippet("scopedObject.flag")).negated();

        let value = fact.compute(&ctx).unwrap();

        prop_assert_eq!(value, json!(!flag.unwrap_or(false)));
    }

    /// PROPERTY: all/any/none agree with the boolean folds of their clauses.
    #[test]
    fn property_aggregates_match_folds(flags in proptest::collection::vec(any::<bool>(), 1..6)) {
        let ctx = context(json!({}));
        let _root = ctx.enter_root().unwrap();
        let clauses = || flags.iter().copied().map(literal).collect::<Vec<_>>();

        let all = ExpressionNode::all(clauses()).evaluate_bool(&ctx, "all", None).unwrap();
        let any = ExpressionNode::any(clauses()).evaluate_bool(&ctx, "any", None).unwrap();
        let none = ExpressionNode::none(clauses()).evaluate_bool(&ctx, "none", None).unwrap();

        prop_assert_eq!(all, flags.iter().all(|f| *f));
        prop_assert_eq!(any, flags.iter().any(|f| *f));
        prop_assert_eq!(none, !flags.iter().any(|f| *f));
    }

    /// PROPERTY: A counted repeat runs its body exactly that many times.
    #[test]
    fn property_repeat_runs_exactly_n_times(n in 0u32..20) {
        prop_assert_eq!(ticks(RepeatAction::new(tick_body()).iterations(n)), n as usize);
    }

    /// PROPERTY: `until` stops after the iteration that satisfies it.
    #[test]
    fn property_repeat_until_stops_early(n in 0u32..20, k in 0u32..20) {
        let repeat = RepeatAction::new(tick_body())
            .iterations(n)
            .until(ExpressionNode::snippet(format!("index >= {}", k)));

        prop_assert_eq!(ticks(repeat), n.min(k + 1) as usize);
    }
}
