//! Scenario: Patient facts
//!
//! Journey: A library author defines facts about a patient and combines
//! them into guards.
//!
//! Success Criteria:
//! - A deceased patient is not alive
//! - An `all` aggregate holds exactly when every clause holds
//! - Facts are computed once per subject state

use std::sync::Arc;

use serde_json::{json, Value};

use cdss::domain::entities::{ExpressionNode, Fact, Library, LogicBlock};
use cdss::domain::execution::ExecutionContext;
use cdss::JsonPathAccessor;

use crate::common::*;

fn context_over(library: Library, subject: Value) -> ExecutionContext {
    ExecutionContext::builder(subject, Arc::new(JsonPathAccessor::default()))
        .with_libraries(vec![Arc::new(library)])
        .open()
}

/// SCENARIO: the liveness fact reads the deceased date
#[test]
fn scenario_deceased_patient_is_not_alive() {
    let library = Library::from_yaml(IMMUNIZATION_LIBRARY).unwrap();

    let ctx = context_over(library.clone(), deceased_patient());
    let _root = ctx.enter_root().unwrap();
    assert_eq!(ctx.fact("isAlive").unwrap().compute(&ctx).unwrap(), json!(false));

    let ctx = context_over(library, child_patient());
    let _root = ctx.enter_root().unwrap();
    assert_eq!(ctx.fact("isAlive").unwrap().compute(&ctx).unwrap(), json!(true));
}

/// SCENARIO: property names match regardless of case
#[test]
fn scenario_fact_text_uses_model_casing() {
    let fact = Fact::new(
        "isAlive",
        ExpressionNode::snippet("!scopedObject.DeceasedDate.HasValue"),
    );
    let library = Library::new("casing").with_block(LogicBlock::new("b", None).with(fact.into()));
    let ctx = context_over(library, json!({ "deceasedDate": "2023-11-02" }));
    let _root = ctx.enter_root().unwrap();
    assert_eq!(ctx.fact("isAlive").unwrap().compute(&ctx).unwrap(), json!(false));
}

/// SCENARIO: alive, tagged and active; a fourth false clause flips the result
#[test]
fn scenario_all_aggregate_over_three_facts() {
    let library = Library::from_yaml(IMMUNIZATION_LIBRARY).unwrap();
    let mut subject = child_patient();
    subject["tags"] = json!([{ "key": "smoker", "value": true }]);

    let ctx = context_over(library, subject);
    let _root = ctx.enter_root().unwrap();

    let clauses = || {
        vec![
            ExpressionNode::fact("isAlive"),
            ExpressionNode::fact("isSmoker"),
            ExpressionNode::fact("isActive"),
        ]
    };
    let all = ExpressionNode::all(clauses());
    assert_eq!(all.evaluate(&ctx, None).unwrap(), json!(true));

    let mut four = clauses();
    four.push(ExpressionNode::snippet("false"));
    let all = ExpressionNode::all(four);
    assert_eq!(all.evaluate(&ctx, None).unwrap(), json!(false));
}

/// SCENARIO: a fact is computed once until the subject changes
#[test]
fn scenario_facts_are_memoized_per_state() {
    let library = Library::from_yaml(IMMUNIZATION_LIBRARY).unwrap();
    let ctx = context_over(library, child_patient());
    let _root = ctx.enter_root().unwrap();

    // isChild lives in the included library, which this context never loaded
    assert!(ctx.fact("isChild").is_err());

    let alive = ctx.fact("isAlive").unwrap();
    let first = alive.compute(&ctx).unwrap();
    let second = alive.compute(&ctx).unwrap();
    assert_eq!(first, second);
}
