//! Scenario: Immunization schedule
//!
//! Journey: A clinic loads an immunization library (which includes a shared
//! library) and runs it against patients to get proposed doses.
//!
//! Steps:
//! 1. Libraries are loaded from disk, includes resolved
//! 2. A child patient gets MMR dose proposals, attributed to the protocol
//! 3. A deceased patient gets a warning and no proposals
//! 4. A scheduler restricts execution to one protocol scope

use std::sync::Arc;

use serde_json::json;

use cdss::domain::entities::{
    Action, ActionCollection, LogicBlock, Protocol, ProposeAction, RepeatAction, Rule,
    RuleReference,
};
use cdss::{
    DecisionEngine, EngineError, ExecutionParameters, InMemoryLibraryRepository, IssuePriority,
    JsonPathAccessor, Library,
};

use crate::common::*;

fn clinic() -> TestEnv {
    TestEnv::builder()
        .with_library("immunization.yaml", IMMUNIZATION_LIBRARY)
        .with_library("common.json", COMMON_LIBRARY)
        .build()
}

/// SCENARIO: a child is due two MMR doses
#[test]
fn scenario_child_gets_attributed_dose_proposals() {
    let env = clinic();
    let outputs = env
        .engine()
        .execute(&child_patient(), &ExecutionParameters::new())
        .unwrap();

    let proposals: Vec<_> = outputs.iter().filter_map(|o| o.as_proposal()).collect();
    assert_eq!(proposals.len(), 2);
    assert!(outputs.iter().all(|o| o.as_issue().is_none()));

    for (i, proposal) in proposals.iter().enumerate() {
        assert_eq!(proposal.attribution.protocol.as_deref(), Some("mmr"));
        assert_eq!(proposal.attribution.protocol_name.as_deref(), Some("MMR schedule"));
        assert_eq!(proposal.attribution.version.as_deref(), Some("1.0"));
        assert_eq!(proposal.attribution.sequence, Some(i as i64));
        assert_eq!(proposal.model["$type"], json!("SubstanceAdministration"));
        assert_eq!(proposal.model["product"], json!("MMR"));
        assert_eq!(proposal.model["doseSequence"], json!(i + 1));
        assert_eq!(proposal.model["id"], json!(proposal.id.to_string()));
    }
    assert_ne!(proposals[0].id, proposals[1].id);
}

/// SCENARIO: a deceased patient is flagged and gets nothing proposed
#[test]
fn scenario_deceased_patient_gets_warning_only() {
    let env = clinic();
    let outputs = env
        .engine()
        .execute(&deceased_patient(), &ExecutionParameters::new())
        .unwrap();

    assert_eq!(outputs.len(), 1);
    let issue = outputs[0].as_issue().expect("issue");
    assert_eq!(issue.priority, IssuePriority::Warning);
    assert_eq!(issue.issue_type, "deceased");
    assert_eq!(issue.subject, Some(json!("patient-2")));
    assert_eq!(issue.protocol, None);
}

/// SCENARIO: the scheduler asks for one protocol scope at a time
#[test]
fn scenario_scope_parameter_selects_protocols() {
    let env = clinic();
    let engine = env.engine();

    let imm = ExecutionParameters::new().with("_scope", "imm");
    assert_eq!(engine.execute(&child_patient(), &imm).unwrap().len(), 2);

    let antenatal = ExecutionParameters::new().with("_scope", "anc");
    assert!(engine.execute(&child_patient(), &antenatal).unwrap().is_empty());
}

/// SCENARIO: a missing include stops the run before anything executes
#[test]
fn scenario_missing_include_is_reported() {
    let env = TestEnv::builder()
        .with_library("immunization.yaml", IMMUNIZATION_LIBRARY)
        .build();
    let err = env
        .engine()
        .execute(&child_patient(), &ExecutionParameters::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::UnresolvedLibrary { ref reference } if reference.contains("common")));
}

/// SCENARIO: proposals made by a protocol invoked inside a repeat carry
/// both the protocol identity and the repeat index
#[test]
fn scenario_repeat_around_protocol_attribution() {
    let protocol = Protocol::new(
        Rule::new("X").then(Action::Propose(ProposeAction::inline(json!({ "$type": "Act" })))),
    );
    let driver = Rule::new("driver").then(Action::Repeat(
        RepeatAction::new(ActionCollection::new(vec![Action::RuleRef(RuleReference::new("X"))]))
            .iterations(3),
    ));
    let library = Library::new("schedule").with_block(
        LogicBlock::new("main", None)
            .with(driver.into())
            .with(protocol.into()),
    );
    let engine = DecisionEngine::new(vec![Arc::new(library)], Arc::new(JsonPathAccessor::default()))
        .with_resolver(InMemoryLibraryRepository::new());

    let outputs = engine.execute(&json!({}), &ExecutionParameters::new()).unwrap();
    let proposals: Vec<_> = outputs.iter().filter_map(|o| o.as_proposal()).collect();

    // Three from the driver's loop, then one from the protocol's own run
    assert_eq!(proposals.len(), 4);
    for (i, proposal) in proposals[..3].iter().enumerate() {
        assert_eq!(proposal.attribution.protocol.as_deref(), Some("X"));
        assert_eq!(proposal.attribution.sequence, Some(i as i64));
    }
    assert_eq!(proposals[3].attribution.protocol.as_deref(), Some("X"));
    assert_eq!(proposals[3].attribution.sequence, None);
}

/// SCENARIO: a debug run appends its session after the clinical outputs
#[test]
fn scenario_debug_session_comes_last() {
    let env = clinic();
    let outputs = env
        .engine()
        .execute(&child_patient(), &ExecutionParameters::new().debug())
        .unwrap();

    assert_eq!(outputs.len(), 3);
    let session = outputs.last().and_then(|o| o.as_debug()).expect("debug session");
    assert!(session.frame_count() > 0);
    assert!(outputs[..2].iter().all(|o| o.as_proposal().is_some()));
}
