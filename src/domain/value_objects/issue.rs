//! Detected issue value object
//!
//! Structured warnings and errors raised by `issue` actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Severity of a detected issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IssuePriority {
    Error,
    Warning,
    #[default]
    #[serde(alias = "information")]
    Info,
}

impl std::fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssuePriority::Error => write!(f, "error"),
            IssuePriority::Warning => write!(f, "warning"),
            IssuePriority::Info => write!(f, "info"),
        }
    }
}

/// An issue detected while evaluating a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIssue {
    pub id: Uuid,
    pub priority: IssuePriority,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub text: String,
    /// Identity of the scoped object the issue was raised against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Value>,
    /// Protocol that was executing, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub raised_at: DateTime<Utc>,
}

impl DetectedIssue {
    pub fn new(priority: IssuePriority, issue_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority,
            issue_type: issue_type.into(),
            text: text.into(),
            subject: None,
            protocol: None,
            raised_at: Utc::now(),
        }
    }

    /// Builder: attach the reference of the object the issue concerns
    pub fn with_subject(mut self, subject: Option<Value>) -> Self {
        self.subject = subject;
        self
    }

    /// Builder: attach the executing protocol
    pub fn with_protocol(mut self, protocol: Option<String>) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn is_error(&self) -> bool {
        self.priority == IssuePriority::Error
    }
}
