//! Execution Event Port
//!
//! Provides an observable interface for rule evaluation.
//! Enables debug sessions, NDJSON traces, and log output.

use std::time::Duration;

use serde_json::Value;

use crate::domain::entities::Proposal;
use crate::domain::value_objects::{DefinitionRef, DetectedIssue};

/// Event emitted while an execution context runs
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A stack frame was pushed
    FrameEntered { depth: usize, owner: DefinitionRef },

    /// A stack frame was popped
    FrameExited { depth: usize, owner: DefinitionRef },

    /// A fact produced its value
    FactComputed {
        fact: DefinitionRef,
        value: Value,
        elapsed: Duration,
        cached: bool,
    },

    /// A variable was looked up
    VariableRead { name: String, value: Value },

    /// A variable was bound on a frame or the context
    VariableWritten { name: String, value: Value },

    /// An assign action wrote (or declined to write) a property
    PropertyAssigned {
        path: String,
        value: Value,
        skipped: bool,
    },

    /// An issue was appended to the journal
    IssueRaised { issue: DetectedIssue },

    /// A proposal was appended to the journal
    ProposalPushed { proposal: Proposal },

    /// An error crossed an asset boundary
    ErrorCaught {
        asset: DefinitionRef,
        message: String,
    },
}

impl ExecutionEvent {
    /// Per-value events that summary observers may skip
    pub fn is_detailed(&self) -> bool {
        matches!(
            self,
            ExecutionEvent::FactComputed { .. }
                | ExecutionEvent::VariableRead { .. }
                | ExecutionEvent::VariableWritten { .. }
                | ExecutionEvent::PropertyAssigned { .. }
        )
    }
}

/// Trait for receiving execution events
///
/// Implementations can be:
/// - DebugRecorder: builds the debug session tree
/// - JsonTraceSink: NDJSON event stream
/// - LogObserver: forwards to `tracing`
/// - NoopObserver: silent operation
pub trait ExecutionObserver: Send + Sync {
    /// Handle an execution event
    fn on_event(&self, event: &ExecutionEvent);

    /// Check if this observer wants per-value events
    ///
    /// Frame, issue, proposal and error events are always delivered.
    fn wants_detailed_events(&self) -> bool {
        true
    }
}

/// No-op observer for silent operation
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {
    fn on_event(&self, _event: &ExecutionEvent) {}

    fn wants_detailed_events(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::DefinitionKind;
    use std::sync::{Arc, Mutex};

    /// Test observer that records all events
    struct RecordingObserver {
        events: Arc<Mutex<Vec<ExecutionEvent>>>,
    }

    impl ExecutionObserver for RecordingObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn recording_observer_captures_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let observer = RecordingObserver {
            events: events.clone(),
        };

        observer.on_event(&ExecutionEvent::FrameEntered {
            depth: 0,
            owner: DefinitionRef::anonymous(DefinitionKind::Context),
        });
        observer.on_event(&ExecutionEvent::VariableRead {
            name: "index".to_string(),
            value: Value::from(1),
        });

        let recorded = events.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert!(!recorded[0].is_detailed());
        assert!(recorded[1].is_detailed());
    }

    #[test]
    fn noop_observer_wants_no_details() {
        assert!(!NoopObserver.wants_detailed_events());
    }
}
