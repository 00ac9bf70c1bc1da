//! Subject isolation contracts
//!
//! These contracts ensure an evaluation never leaks into the caller's
//! subject, except for the configured analysis fields written by `analyze`.

use serde_json::json;

use cdss::ExecutionParameters;

use crate::common::*;

fn clinic_with_backlink() -> TestEnv {
    TestEnv::builder()
        .with_library("immunization.yaml", IMMUNIZATION_LIBRARY)
        .with_library("common.json", COMMON_LIBRARY)
        .with_project_config("[model]\nproposal_backlink = \"proposals\"\n")
        .build()
}

/// CONTRACT: `execute` leaves the caller's subject untouched
///
/// Proposals are appended to the backlink on the working copy only.
#[test]
fn contract_execute_never_mutates_subject() {
    let env = clinic_with_backlink();
    let subject = child_patient();

    let outputs = env.engine().execute(&subject, &ExecutionParameters::new()).unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(subject, child_patient());
    assert!(subject.get("proposals").is_none());
}

/// CONTRACT: every run starts from the caller's subject, not the last run
#[test]
fn contract_runs_are_independent() {
    let env = clinic_with_backlink();
    let engine = env.engine();
    let subject = child_patient();

    let first = engine.execute(&subject, &ExecutionParameters::new()).unwrap();
    let second = engine.execute(&subject, &ExecutionParameters::new()).unwrap();

    assert_eq!(first.len(), second.len());
    let ids = |outputs: &[cdss::EngineOutput]| -> Vec<_> {
        outputs.iter().filter_map(|o| o.as_proposal()).map(|p| p.id).collect()
    };
    for id in ids(&first) {
        assert!(!ids(&second).contains(&id), "proposal ids must be fresh per run");
    }
}

/// CONTRACT: `analyze` copies back analysis fields and nothing else
#[test]
fn contract_analyze_writes_only_analysis_fields() {
    let env = TestEnv::builder()
        .with_library("vitals.yaml", VITALS_LIBRARY)
        .build();
    let mut subject = high_bp_observation();

    let issues = env.engine().analyze(&mut subject, &ExecutionParameters::new()).unwrap();

    assert_eq!(issues.len(), 1);
    let mut expected = high_bp_observation();
    expected["interpretation"] = json!("H");
    assert_eq!(subject, expected);
}

/// CONTRACT: `analyze` runs rules only; protocols never propose
#[test]
fn contract_analyze_skips_protocols() {
    let env = clinic_with_backlink();
    let mut subject = child_patient();

    let issues = env.engine().analyze(&mut subject, &ExecutionParameters::new()).unwrap();

    assert!(issues.is_empty());
    assert_eq!(subject, child_patient());
}
