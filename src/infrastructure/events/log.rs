//! Log observer
//!
//! Forwards execution events to `tracing`, so `-v` / `CDSS_LOG` show rule
//! flow without a debug session.

use tracing::{debug, trace, warn};

use crate::domain::ports::{ExecutionEvent, ExecutionObserver};

/// Observer that logs execution events
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver {
    detailed: bool,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: also log facts, variables and assignments
    pub fn detailed(mut self) -> Self {
        self.detailed = true;
        self
    }
}

impl ExecutionObserver for LogObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::FrameEntered { depth, owner } => {
                debug!(depth, owner = %owner, "enter")
            }
            ExecutionEvent::FrameExited { depth, owner } => {
                debug!(depth, owner = %owner, "exit")
            }
            ExecutionEvent::FactComputed {
                fact,
                value,
                elapsed,
                cached,
            } => trace!(fact = %fact, value = %value, ?elapsed, cached, "fact"),
            ExecutionEvent::VariableRead { name, value } => {
                trace!(name = %name, value = %value, "read")
            }
            ExecutionEvent::VariableWritten { name, value } => {
                trace!(name = %name, value = %value, "write")
            }
            ExecutionEvent::PropertyAssigned {
                path,
                value,
                skipped,
            } => trace!(path = %path, value = %value, skipped, "assign"),
            ExecutionEvent::IssueRaised { issue } => debug!(
                priority = %issue.priority,
                issue_type = %issue.issue_type,
                text = %issue.text,
                "issue raised"
            ),
            ExecutionEvent::ProposalPushed { proposal } => debug!(
                id = %proposal.id,
                protocol = proposal.attribution.protocol.as_deref().unwrap_or("-"),
                "proposal pushed"
            ),
            ExecutionEvent::ErrorCaught { asset, message } => {
                warn!(asset = %asset, error = %message, "evaluation failed")
            }
        }
    }

    fn wants_detailed_events(&self) -> bool {
        self.detailed
    }
}
