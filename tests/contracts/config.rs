//! Configuration contracts
//!
//! Unknown keys warn but never fail; invalid values always fail;
//! `CDSS_*` environment variables override file values.

use serde_json::json;

use crate::common::*;

fn vitals_env() -> TestEnv {
    TestEnv::builder()
        .with_library("vitals.yaml", VITALS_LIBRARY)
        .with_subject("obs.json", &high_bp_observation())
        .build()
}

/// CONTRACT: a typo in the config file is a warning with a suggestion
#[test]
fn contract_unknown_key_warns() {
    let env = vitals_env();
    env.write_project_file("custom.toml", "[analysis]\nwritable_feilds = [\"note\"]\n");

    let result = env.run(&["analyze", "obs.json", "--config", "custom.toml"]);

    assert!(result.success, "analyze failed:\n{}", result.combined_output());
    assert!(result.stderr.contains("unknown key 'writable_feilds'"), "{}", result.stderr);
    assert!(result.stderr.contains("did you mean 'writable_fields'?"), "{}", result.stderr);
}

/// CONTRACT: an explicit config with an invalid value stops the run
#[test]
fn contract_invalid_value_fails() {
    let env = vitals_env();
    env.write_project_file("custom.toml", "[limits]\nmax_depth = 0\n");

    let result = env.run(&["analyze", "obs.json", "--config", "custom.toml"]);

    assert!(!result.success);
    assert!(result.stderr.contains("max_depth"), "{}", result.stderr);
}

/// CONTRACT: environment overrides beat the project config
#[test]
fn contract_env_overrides_project_config() {
    let env = TestEnv::builder()
        .with_library("vitals.yaml", VITALS_LIBRARY)
        .with_subject("obs.json", &high_bp_observation())
        .with_project_config("[analysis]\nwritable_fields = [\"interpretation\"]\n")
        .build();

    let result = env.run_with_env(
        &["analyze", "obs.json", "--json"],
        &[("CDSS_WRITABLE_FIELDS", "note")],
    );

    assert!(result.success, "analyze failed:\n{}", result.combined_output());
    let lines = result.json_lines();
    let subject = &lines.last().expect("subject line")["subject"];
    assert_eq!(subject["note"], json!("rules may scribble on the working copy"));
    assert!(subject.get("interpretation").is_none());
}
