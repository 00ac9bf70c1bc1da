//! Lifecycle gating contracts
//!
//! Active definitions run; trial-use definitions run only when debugging
//! or when non-active definitions are allowed; retired and dont-use
//! definitions refuse to run unless explicitly allowed.

use serde_json::json;

use cdss::{EngineError, ExecutionParameters, LifecycleStatus};

use crate::common::*;

const RETIRED_RULE_LIBRARY: &str = r#"
id: legacy
blocks:
  - id: main
    definitions:
      - type: rule
        id: old-rule
        status: retired
        then:
          - type: issue
            text: retired rule ran
"#;

fn trial_env() -> TestEnv {
    TestEnv::builder()
        .with_library("trial.yaml", TRIAL_LIBRARY)
        .build()
}

/// CONTRACT: trial-use libraries are skipped in normal runs
#[test]
fn contract_trial_use_is_skipped_by_default() {
    let outputs = trial_env()
        .engine()
        .execute(&json!({}), &ExecutionParameters::new())
        .unwrap();
    assert!(outputs.is_empty());
}

/// CONTRACT: `_debug` and `_allowNonActive` both admit trial-use libraries
#[test]
fn contract_trial_use_runs_when_asked() {
    let engine = trial_env().engine();

    let debug = engine.execute(&json!({}), &ExecutionParameters::new().debug()).unwrap();
    assert_eq!(debug[0].as_issue().map(|i| i.text.as_str()), Some("trial library ran"));

    let allowed = ExecutionParameters::new().with("_allowNonActive", true);
    let outputs = engine.execute(&json!({}), &allowed).unwrap();
    assert_eq!(outputs.len(), 1);
}

/// CONTRACT: a retired asset is refused, not silently skipped
#[test]
fn contract_retired_asset_is_forbidden() {
    let env = TestEnv::builder()
        .with_library("legacy.yaml", RETIRED_RULE_LIBRARY)
        .build();
    let engine = env.engine();

    let err = engine.execute(&json!({}), &ExecutionParameters::new()).unwrap_err();
    match err {
        EngineError::LifecycleForbidden { definition, status } => {
            assert_eq!(definition.id, "old-rule");
            assert_eq!(status, LifecycleStatus::Retired);
        }
        other => panic!("expected a lifecycle refusal, got {other:?}"),
    }

    let allowed = ExecutionParameters::new().with("_allowNonActive", "true");
    assert_eq!(engine.execute(&json!({}), &allowed).unwrap().len(), 1);
}

/// CONTRACT: validation flags withdrawn libraries without failing
#[test]
fn contract_validate_warns_about_withdrawn_libraries() {
    let env = TestEnv::builder()
        .with_library("gone.yaml", "id: gone\nstatus: dont-use\n")
        .build();
    let issues = env.engine().validate();
    assert!(issues
        .iter()
        .any(|i| !i.is_error() && i.message.contains("refuses to run")));
}
