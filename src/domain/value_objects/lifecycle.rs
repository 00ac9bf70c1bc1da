//! Lifecycle status value object
//!
//! Every definition node carries a status that gates whether it may run.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleStatus {
    /// Under evaluation; only runs in debug or testing executions
    #[serde(alias = "TrialUse", alias = "trial")]
    TrialUse,
    /// In production use
    #[default]
    #[serde(alias = "Active")]
    Active,
    /// Superseded
    #[serde(alias = "Retired")]
    Retired,
    /// Known to be unsafe
    #[serde(alias = "DontUse", alias = "dontuse")]
    DontUse,
}

impl LifecycleStatus {
    /// Returns true if this is the production status
    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleStatus::Active)
    }

    /// Returns true for statuses that must never run without an override
    pub fn is_withdrawn(&self) -> bool {
        matches!(self, LifecycleStatus::Retired | LifecycleStatus::DontUse)
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleStatus::TrialUse => write!(f, "trial-use"),
            LifecycleStatus::Active => write!(f, "active"),
            LifecycleStatus::Retired => write!(f, "retired"),
            LifecycleStatus::DontUse => write!(f, "dont-use"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_default_is_active() {
        assert_eq!(LifecycleStatus::default(), LifecycleStatus::Active);
    }

    #[test]
    fn lifecycle_serde_kebab_case() {
        let status: LifecycleStatus = serde_json::from_str("\"dont-use\"").unwrap();
        assert_eq!(status, LifecycleStatus::DontUse);
        let status: LifecycleStatus = serde_json::from_str("\"TrialUse\"").unwrap();
        assert_eq!(status, LifecycleStatus::TrialUse);
        assert_eq!(
            serde_json::to_string(&LifecycleStatus::TrialUse).unwrap(),
            "\"trial-use\""
        );
    }

    #[test]
    fn lifecycle_withdrawn() {
        assert!(LifecycleStatus::Retired.is_withdrawn());
        assert!(LifecycleStatus::DontUse.is_withdrawn());
        assert!(!LifecycleStatus::TrialUse.is_withdrawn());
        assert!(!LifecycleStatus::Active.is_withdrawn());
    }
}
