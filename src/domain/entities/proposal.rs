//! Proposal entity - a new model recommended by the engine

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::value_objects::{DetectedIssue, DefinitionRef};
use crate::domain::diagnostics::DebugSession;

/// Which protocol and iteration produced a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    /// Iteration index of the nearest enclosing repeat
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

impl Attribution {
    pub fn is_empty(&self) -> bool {
        self.protocol.is_none() && self.sequence.is_none()
    }
}

/// A newly constructed model produced by a `propose` action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: Uuid,
    pub model: Value,
    pub attribution: Attribution,
    /// The definition that was executing when the proposal was pushed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DefinitionRef>,
}

/// One entry of the output sequence returned by `execute`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineOutput {
    Proposal(Proposal),
    Issue(DetectedIssue),
    Debug(DebugSession),
}

impl EngineOutput {
    pub fn as_proposal(&self) -> Option<&Proposal> {
        match self {
            EngineOutput::Proposal(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_issue(&self) -> Option<&DetectedIssue> {
        match self {
            EngineOutput::Issue(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_debug(&self) -> Option<&DebugSession> {
        match self {
            EngineOutput::Debug(d) => Some(d),
            _ => None,
        }
    }
}
