//! Lifecycle Policy
//!
//! Decides whether a definition in a given lifecycle state may run.
//! This is a pure policy - it operates on metadata only.

use tracing::warn;

use crate::domain::value_objects::{DefinitionKind, DefinitionMetadata, LifecycleStatus};
use crate::error::{EngineError, EngineResult};

/// What to do with a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Run,
    Skip,
}

/// Lifecycle gate derived from execution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecyclePolicy {
    /// `_allowNonActive`: every state runs
    pub allow_non_active: bool,
    /// `_debug`: trial-use definitions run
    pub include_trial_use: bool,
}

impl LifecyclePolicy {
    pub fn new(allow_non_active: bool, include_trial_use: bool) -> Self {
        Self {
            allow_non_active,
            include_trial_use,
        }
    }

    /// Decide for one status
    pub fn decide(&self, status: LifecycleStatus) -> Admission {
        if self.allow_non_active || status.is_active() {
            return Admission::Run;
        }
        match status {
            LifecycleStatus::TrialUse if self.include_trial_use => Admission::Run,
            _ => Admission::Skip,
        }
    }

    /// Admit a definition: trial-use is skipped, withdrawn states refuse
    pub fn admit(&self, meta: &DefinitionMetadata, kind: DefinitionKind) -> EngineResult<Admission> {
        let admission = self.decide(meta.status);
        if admission == Admission::Skip && meta.status.is_withdrawn() {
            return Err(EngineError::LifecycleForbidden {
                definition: meta.reference(kind),
                status: meta.status,
            });
        }
        if admission == Admission::Skip {
            warn!(kind = %kind, id = %meta.id, status = %meta.status, "skipping definition");
        }
        Ok(admission)
    }
}
