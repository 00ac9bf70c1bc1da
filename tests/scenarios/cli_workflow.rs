//! Scenario: Command-line workflow
//!
//! Journey: A library author checks a library directory, then runs it
//! against subject documents from the shell.
//!
//! Success Criteria:
//! - `validate` passes clean libraries and fails broken ones with reasons
//! - `execute --json` prints one output per line
//! - `analyze` prints the subject with only analysis fields changed

use serde_json::json;

use crate::common::*;

/// SCENARIO: validate, then execute a clean library set
#[test]
fn scenario_validate_then_execute() {
    let env = TestEnv::builder()
        .with_library("immunization.yaml", IMMUNIZATION_LIBRARY)
        .with_library("common.json", COMMON_LIBRARY)
        .with_subject("child.json", &child_patient())
        .build();

    let result = env.run(&["validate"]);
    assert!(result.success, "validate failed:\n{}", result.combined_output());
    assert!(result.stdout.contains("2 libraries checked, 0 error(s)"), "{}", result.stdout);

    let result = env.run(&["execute", "child.json", "--json"]);
    assert!(result.success, "execute failed:\n{}", result.combined_output());
    let lines = result.json_lines();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert_eq!(line["kind"], json!("proposal"));
        assert_eq!(line["attribution"]["protocol"], json!("mmr"));
    }

    let result = env.run(&["execute", "child.json", "--json", "-p", "_debug=true"]);
    let lines = result.json_lines();
    assert_eq!(lines.last().map(|l| l["kind"].clone()), Some(json!("debug")));
}

/// SCENARIO: a broken library is rejected with a non-zero exit
#[test]
fn scenario_validate_reports_broken_library() {
    let env = TestEnv::builder()
        .with_library("broken.yaml", BROKEN_LIBRARY)
        .build();

    let result = env.run(&["validate"]);
    assert!(!result.success);
    assert_eq!(result.exit_code, 1);
    assert!(result.stdout.contains("does not compile"), "{}", result.stdout);
    assert!(result.stdout.contains("never terminate"), "{}", result.stdout);
    assert!(result.stdout.contains("nowhere"), "{}", result.stdout);
}

/// SCENARIO: analyze writes back the interpretation and nothing else
#[test]
fn scenario_analyze_observation() {
    let env = TestEnv::builder()
        .with_library("vitals.yaml", VITALS_LIBRARY)
        .with_subject("obs.json", &high_bp_observation())
        .build();

    let result = env.run(&["analyze", "obs.json", "--json"]);
    assert!(result.success, "analyze failed:\n{}", result.combined_output());
    let lines = result.json_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], json!("issue"));
    assert_eq!(lines[0]["issue"]["priority"], json!("error"));

    let subject = &lines[1]["subject"];
    assert_eq!(subject["interpretation"], json!("H"));
    assert!(subject.get("note").is_none());
    assert_eq!(subject["value"], json!(162));
}

/// SCENARIO: the project config widens the analysis fields
#[test]
fn scenario_project_config_changes_writable_fields() {
    let env = TestEnv::builder()
        .with_library("vitals.yaml", VITALS_LIBRARY)
        .with_subject("obs.json", &high_bp_observation())
        .with_project_config("[analysis]\nwritable_fields = [\"interpretation\", \"note\"]\n")
        .build();

    let result = env.run(&["analyze", "obs.json", "--json"]);
    assert!(result.success, "analyze failed:\n{}", result.combined_output());
    let lines = result.json_lines();
    let subject = &lines.last().expect("subject line")["subject"];
    assert_eq!(subject["note"], json!("rules may scribble on the working copy"));
}

/// SCENARIO: a subject that is not JSON fails with a readable message
#[test]
fn scenario_bad_subject_file() {
    let env = TestEnv::builder()
        .with_library("vitals.yaml", VITALS_LIBRARY)
        .build();
    env.write_project_file("obs.json", "{ not json");

    let result = env.run(&["analyze", "obs.json"]);
    assert!(!result.success);
    assert!(result.stderr.contains("not valid JSON"), "{}", result.stderr);
}
