//! Debug session model
//!
//! A tree of debug frames mirroring the stack frames of one execution, each
//! holding the samples collected while it was the current frame.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::Attribution;
use crate::domain::value_objects::{ContentHash, DefinitionRef, DetectedIssue};

/// Fingerprint of a library visible to the execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryFingerprint {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
}

/// One observation recorded inside a debug frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "sample", rename_all = "camelCase")]
pub enum DebugSample {
    #[serde(rename_all = "camelCase")]
    Fact {
        fact: DefinitionRef,
        value: Value,
        elapsed_micros: u64,
        cached: bool,
    },
    VariableRead { name: String, value: Value },
    VariableWritten { name: String, value: Value },
    PropertyAssigned {
        path: String,
        value: Value,
        skipped: bool,
    },
    Issue { issue: DetectedIssue },
    Proposal { id: Uuid, attribution: Attribution },
    Error { asset: DefinitionRef, message: String },
}

/// Debug counterpart of a stack frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugFrame {
    pub owner: DefinitionRef,
    pub entered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<DebugSample>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DebugFrame>,
}

impl DebugFrame {
    pub fn new(owner: DefinitionRef) -> Self {
        Self {
            owner,
            entered_at: Utc::now(),
            exited_at: None,
            samples: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Depth-first, pre-order
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a DebugFrame)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Replayable record of one execution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSession {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub libraries: Vec<LibraryFingerprint>,
    pub frames: Vec<DebugFrame>,
    /// Samples observed while no frame was active
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<DebugSample>,
}

impl DebugSession {
    /// Every frame, depth-first
    pub fn all_frames(&self) -> Vec<&DebugFrame> {
        let mut out = Vec::new();
        for root in &self.frames {
            root.walk(&mut |frame| out.push(frame));
        }
        out
    }

    /// Every sample, frames depth-first then unframed samples
    pub fn all_samples(&self) -> Vec<&DebugSample> {
        let mut out: Vec<&DebugSample> = Vec::new();
        for frame in self.all_frames() {
            out.extend(frame.samples.iter());
        }
        out.extend(self.samples.iter());
        out
    }

    pub fn frame_count(&self) -> usize {
        self.all_frames().len()
    }
}
