//! Error reporting contracts
//!
//! Evaluation failures are wrapped exactly once, at the innermost asset,
//! with the frame chain that was live at the time. Engine misuse is never
//! wrapped.

use std::sync::Arc;

use serde_json::json;

use cdss::domain::entities::{
    Action, ActionCollection, ExpressionNode, Fact, LogicBlock, RepeatAction, Rule, RuleReference,
};
use cdss::domain::execution::{ExecutionContext, FrameOwner};
use cdss::domain::value_objects::DefinitionKind;
use cdss::{DecisionEngine, EngineConfig, EngineError, ExecutionParameters, JsonPathAccessor, Library};

fn engine_over(block: LogicBlock, config: EngineConfig) -> DecisionEngine {
    let library = Library::new("lib").with_block(block);
    DecisionEngine::new(vec![Arc::new(library)], Arc::new(JsonPathAccessor::default()))
        .with_config(config)
}

/// CONTRACT: the innermost asset owns the error and records the stack
#[test]
fn contract_errors_wrap_once_with_stack() {
    let block = LogicBlock::new("main", None)
        .with(Fact::new("bad", ExpressionNode::snippet("missing + 1")).into())
        .with(Rule::new("r").when(ExpressionNode::snippet("fact('bad') > 0")).into());
    let engine = engine_over(block, EngineConfig::default());

    let err = engine.execute(&json!({}), &ExecutionParameters::new()).unwrap_err();
    let evaluation = err.evaluation().expect("wrapped evaluation error");

    assert_eq!(evaluation.asset.kind, DefinitionKind::Fact);
    assert!(matches!(err.root_cause(), EngineError::UnknownVariable(name) if name == "missing"));
    assert!(evaluation.cause.evaluation().is_none(), "wrapped more than once");

    let report = format!("{}\n{}", evaluation, evaluation.stack_trace());
    insta::assert_snapshot!(report, @r"
    evaluation of fact 'bad' failed: unknown variable 'missing'
      at fact 'bad'
      at rule 'r'
      at logic block 'main'
      at library 'lib'
      at context
    ");
}

/// CONTRACT: frame misuse surfaces as an invalid-state error, unwrapped
#[test]
fn contract_invalid_state_is_not_wrapped() {
    let ctx = ExecutionContext::builder(json!({}), Arc::new(JsonPathAccessor::default())).open();

    assert!(matches!(ctx.enter_child(FrameOwner::Actions), Err(EngineError::InvalidState(_))));
    assert!(matches!(ctx.exit(), Err(EngineError::InvalidState(_))));

    let rule = Rule::new("orphan");
    assert!(matches!(rule.compute(&ctx), Err(EngineError::InvalidState(_))));

    let _root = ctx.enter_root().unwrap();
    assert!(matches!(ctx.enter_root(), Err(EngineError::InvalidState(_))));
}

/// CONTRACT: unbounded recursion stops at the configured depth
#[test]
fn contract_recursion_hits_depth_limit() {
    let block = LogicBlock::new("main", None).with(
        Rule::new("again")
            .then(Action::RuleRef(RuleReference::new("again")))
            .into(),
    );
    let mut config = EngineConfig::default();
    config.limits.max_depth = 16;
    let engine = engine_over(block, config);

    let err = engine.execute(&json!({}), &ExecutionParameters::new()).unwrap_err();
    assert!(matches!(err.root_cause(), EngineError::StackOverflow { limit: 16 }));
}

/// CONTRACT: an until-only repeat stops at the iteration cap
#[test]
fn contract_until_repeat_hits_iteration_cap() {
    let repeat = RepeatAction::new(ActionCollection::default()).until(ExpressionNode::snippet("false"));
    let block = LogicBlock::new("main", None)
        .with(Rule::new("spin").then(Action::Repeat(repeat)).into());
    let mut config = EngineConfig::default();
    config.limits.max_iterations = 5;
    let engine = engine_over(block, config);

    let err = engine.execute(&json!({}), &ExecutionParameters::new()).unwrap_err();
    assert_eq!(err.evaluation().map(|e| e.asset.id.as_str()), Some("spin"));
    assert!(matches!(err.root_cause(), EngineError::RepeatLimit { limit: 5 }));
}
