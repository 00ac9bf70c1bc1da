//! Debug recorder
//!
//! An execution observer that builds a [`DebugSession`] from frame and
//! sample events. It never influences control flow.

use std::sync::Mutex;

use chrono::Utc;

use super::session::{DebugFrame, DebugSample, DebugSession, LibraryFingerprint};
use crate::domain::ports::{ExecutionEvent, ExecutionObserver};
use crate::domain::value_objects::ContentHash;

#[derive(Debug)]
struct RecorderState {
    session: DebugSession,
    open: Vec<DebugFrame>,
}

/// Builds the debug frame tree of one execution
#[derive(Debug)]
pub struct DebugRecorder {
    state: Mutex<RecorderState>,
}

impl DebugRecorder {
    pub fn new(libraries: Vec<(String, Option<ContentHash>)>) -> Self {
        let libraries = libraries
            .into_iter()
            .map(|(id, hash)| LibraryFingerprint { id, hash })
            .collect();
        Self {
            state: Mutex::new(RecorderState {
                session: DebugSession {
                    started_at: Utc::now(),
                    finished_at: None,
                    libraries,
                    frames: Vec::new(),
                    samples: Vec::new(),
                },
                open: Vec::new(),
            }),
        }
    }

    /// Close any frames still open and hand out the session
    pub fn finish(&self) -> DebugSession {
        let Ok(mut state) = self.state.lock() else {
            return DebugSession {
                started_at: Utc::now(),
                finished_at: None,
                libraries: Vec::new(),
                frames: Vec::new(),
                samples: Vec::new(),
            };
        };
        while !state.open.is_empty() {
            Self::close_top(&mut state);
        }
        state.session.finished_at = Some(Utc::now());
        state.session.clone()
    }

    fn close_top(state: &mut RecorderState) {
        if let Some(mut frame) = state.open.pop() {
            frame.exited_at = Some(Utc::now());
            match state.open.last_mut() {
                Some(parent) => parent.children.push(frame),
                None => state.session.frames.push(frame),
            }
        }
    }

    fn record(state: &mut RecorderState, sample: DebugSample) {
        let samples = match state.open.last_mut() {
            Some(frame) => &mut frame.samples,
            None => &mut state.session.samples,
        };
        if let (
            DebugSample::VariableRead { name, value },
            Some(DebugSample::VariableRead {
                name: last_name,
                value: last_value,
            }),
        ) = (&sample, samples.last())
        {
            if name == last_name && value == last_value {
                return;
            }
        }
        samples.push(sample);
    }
}

impl ExecutionObserver for DebugRecorder {
    fn on_event(&self, event: &ExecutionEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match event {
            ExecutionEvent::FrameEntered { owner, .. } => {
                state.open.push(DebugFrame::new(owner.clone()));
            }
            ExecutionEvent::FrameExited { .. } => Self::close_top(&mut state),
            ExecutionEvent::FactComputed {
                fact,
                value,
                elapsed,
                cached,
            } => Self::record(
                &mut state,
                DebugSample::Fact {
                    fact: fact.clone(),
                    value: value.clone(),
                    elapsed_micros: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                    cached: *cached,
                },
            ),
            ExecutionEvent::VariableRead { name, value } => Self::record(
                &mut state,
                DebugSample::VariableRead {
                    name: name.clone(),
                    value: value.clone(),
                },
            ),
            ExecutionEvent::VariableWritten { name, value } => Self::record(
                &mut state,
                DebugSample::VariableWritten {
                    name: name.clone(),
                    value: value.clone(),
                },
            ),
            ExecutionEvent::PropertyAssigned {
                path,
                value,
                skipped,
            } => Self::record(
                &mut state,
                DebugSample::PropertyAssigned {
                    path: path.clone(),
                    value: value.clone(),
                    skipped: *skipped,
                },
            ),
            ExecutionEvent::IssueRaised { issue } => Self::record(
                &mut state,
                DebugSample::Issue {
                    issue: issue.clone(),
                },
            ),
            ExecutionEvent::ProposalPushed { proposal } => Self::record(
                &mut state,
                DebugSample::Proposal {
                    id: proposal.id,
                    attribution: proposal.attribution.clone(),
                },
            ),
            ExecutionEvent::ErrorCaught { asset, message } => Self::record(
                &mut state,
                DebugSample::Error {
                    asset: asset.clone(),
                    message: message.clone(),
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{DefinitionKind, DefinitionRef};
    use serde_json::json;

    fn enter(recorder: &DebugRecorder, depth: usize, kind: DefinitionKind, id: &str) {
        recorder.on_event(&ExecutionEvent::FrameEntered {
            depth,
            owner: DefinitionRef::new(kind, id),
        });
    }

    fn exit(recorder: &DebugRecorder, depth: usize) {
        recorder.on_event(&ExecutionEvent::FrameExited {
            depth,
            owner: DefinitionRef::anonymous(DefinitionKind::Actions),
        });
    }

    fn read(recorder: &DebugRecorder, name: &str, value: i64) {
        recorder.on_event(&ExecutionEvent::VariableRead {
            name: name.to_string(),
            value: json!(value),
        });
    }

    #[test]
    fn frames_nest_like_the_stack() {
        let recorder = DebugRecorder::new(vec![("lib".to_string(), None)]);
        enter(&recorder, 0, DefinitionKind::Context, "");
        enter(&recorder, 1, DefinitionKind::Rule, "r1");
        exit(&recorder, 1);
        enter(&recorder, 1, DefinitionKind::Rule, "r2");
        exit(&recorder, 1);
        exit(&recorder, 0);

        let session = recorder.finish();
        assert_eq!(session.frames.len(), 1);
        let ids: Vec<_> = session.frames[0]
            .children
            .iter()
            .map(|f| f.owner.id.as_str())
            .collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert!(session.frames[0].exited_at.is_some());
        assert_eq!(session.frame_count(), 3);
        assert_eq!(session.libraries[0].id, "lib");
    }

    #[test]
    fn consecutive_duplicate_reads_coalesce() {
        let recorder = DebugRecorder::new(Vec::new());
        enter(&recorder, 0, DefinitionKind::Context, "");
        read(&recorder, "index", 1);
        read(&recorder, "index", 1);
        read(&recorder, "index", 2);
        read(&recorder, "index", 1);

        let session = recorder.finish();
        assert_eq!(session.frames[0].samples.len(), 3);
    }

    #[test]
    fn finish_closes_open_frames() {
        let recorder = DebugRecorder::new(Vec::new());
        enter(&recorder, 0, DefinitionKind::Context, "");
        enter(&recorder, 1, DefinitionKind::Fact, "f");
        let session = recorder.finish();
        assert_eq!(session.frames.len(), 1);
        assert_eq!(session.frames[0].children[0].owner.id, "f");
        assert!(session.finished_at.is_some());
    }
}
