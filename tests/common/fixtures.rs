//! Test fixtures - reusable library documents and subjects for tests.

use serde_json::{json, Value};

/// Patient facts, a deceased warning rule and an MMR protocol with two doses
pub const IMMUNIZATION_LIBRARY: &str = r#"
id: immunization
name: Childhood immunization
oid: 1.3.6.1.4.1.99.1
version: "2.1"
status: active
include:
  - id: common
models:
  - id: mmr-dose
    model:
      "$type": SubstanceAdministration
      product: MMR
blocks:
  - id: patient
    context: Patient
    definitions:
      - type: fact
        id: isAlive
        computation: "!scopedObject.deceasedDate.HasValue"
      - type: fact
        id: isSmoker
        computation: "scopedObject.tags.Any(t => t.key == 'smoker' && t.value == true)"
      - type: fact
        id: isActive
        computation: "scopedObject.status == 'active'"
      - type: rule
        id: deceased-warning
        when: "!fact('isAlive')"
        then:
          - type: issue
            priority: warning
            issueType: deceased
            text: Patient is deceased
      - type: protocol
        id: mmr
        name: MMR schedule
        version: "1.0"
        scopes: [imm]
        when:
          type: all
          expressions:
            - { type: fact, fact: isAlive }
            - { type: fact, fact: isChild }
        then:
          - type: repeat
            iterations: 2
            body:
              - type: propose
                modelRef: mmr-dose
                assign:
                  - path: doseSequence
                    expression: "index + 1"
"#;

/// Included by `immunization`; shares the `isChild` fact
pub const COMMON_LIBRARY: &str = r#"{
    "id": "common",
    "status": "active",
    "blocks": [{
        "id": "shared",
        "definitions": [
            { "type": "fact", "id": "isChild", "computation": "scopedObject.age < 18" }
        ]
    }]
}"#;

/// Observation interpretation: writes `interpretation` and raises an issue
pub const VITALS_LIBRARY: &str = r#"
id: vitals
blocks:
  - id: observation
    context: Observation
    definitions:
      - type: rule
        id: bp-high
        when: "scopedObject.value > 140"
        then:
          - type: assign
            path: interpretation
            value: H
          - type: assign
            path: note
            value: rules may scribble on the working copy
          - type: issue
            priority: error
            issueType: bp
            text: Systolic blood pressure is high
"#;

/// A trial-use library that only runs in debug or non-active executions
pub const TRIAL_LIBRARY: &str = r#"
id: trial
status: trial-use
blocks:
  - id: any
    definitions:
      - type: rule
        id: trial-rule
        then:
          - type: issue
            priority: info
            issueType: trial
            text: trial library ran
"#;

/// A library with problems `validate` should report
pub const BROKEN_LIBRARY: &str = r#"
id: broken
blocks:
  - id: main
    definitions:
      - type: fact
        id: bad
        computation: "scopedObject.age >"
      - type: rule
        id: loops
        then:
          - type: repeat
            body: []
      - type: rule
        id: dangling
        then:
          - type: ruleRef
            rule: nowhere
"#;

pub fn child_patient() -> Value {
    json!({
        "$type": "Patient",
        "id": "patient-1",
        "age": 4,
        "status": "active",
        "deceasedDate": null,
        "tags": [
            { "key": "smoker", "value": false },
            { "key": "allergy", "value": true }
        ]
    })
}

pub fn deceased_patient() -> Value {
    json!({
        "$type": "Patient",
        "id": "patient-2",
        "age": 70,
        "status": "active",
        "deceasedDate": "2024-03-01"
    })
}

pub fn high_bp_observation() -> Value {
    json!({ "$type": "Observation", "id": "obs-1", "code": "systolic", "value": 162 })
}
