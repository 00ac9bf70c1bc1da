//! Configuration type definitions

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ObjectPath;
use crate::error::{CompileError, EngineResult};

use super::loader::{self, ConfigWarning};

/// Subject model conventions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Key holding the type discriminator matched against block contexts
    #[serde(default = "default_type_key")]
    pub type_key: String,

    /// Key holding a model's identity
    #[serde(default = "default_id_key")]
    pub id_key: String,

    /// Key receiving protocol attribution on proposals
    #[serde(default = "default_protocols_key")]
    pub protocols_key: String,

    /// Path on the subject that pushed proposals are appended to
    #[serde(default)]
    pub proposal_backlink: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            type_key: default_type_key(),
            id_key: default_id_key(),
            protocols_key: default_protocols_key(),
            proposal_backlink: None,
        }
    }
}

fn default_type_key() -> String {
    "$type".to_string()
}

fn default_id_key() -> String {
    "id".to_string()
}

fn default_protocols_key() -> String {
    "protocols".to_string()
}

/// Path accessor behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessorConfig {
    /// Fields a bare `[guard]` is compared against
    #[serde(default = "default_classifier_fields")]
    pub classifier_fields: Vec<String>,

    #[serde(default = "default_true")]
    pub case_insensitive: bool,
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            classifier_fields: default_classifier_fields(),
            case_insensitive: true,
        }
    }
}

fn default_classifier_fields() -> Vec<String> {
    vec![
        "classifier".to_string(),
        "role".to_string(),
        "type".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

/// Analyze mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Top-level subject fields `analyze` copies back to the caller
    #[serde(default = "default_writable_fields")]
    pub writable_fields: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            writable_fields: default_writable_fields(),
        }
    }
}

fn default_writable_fields() -> Vec<String> {
    vec!["interpretation".to_string()]
}

/// Evaluation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Cap for repeats that only have an `until` condition
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_depth() -> usize {
    256
}

fn default_max_iterations() -> u32 {
    1000
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub accessor: AccessorConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let (config, _warnings) = loader::load_with_warnings(path)?;
        Ok(config)
    }

    /// Load configuration and collect non-fatal warnings (e.g. unknown keys).
    pub fn load_with_warnings(path: &Path) -> EngineResult<(Self, Vec<ConfigWarning>)> {
        loader::load_with_warnings(path)
    }

    /// Load from project config, user config, or defaults
    pub fn load_or_default(project_root: Option<&Path>) -> Self {
        loader::load_or_default(project_root)
    }

    /// Apply environment variable overrides (CDSS_* prefix)
    pub fn with_env_overrides(self) -> Self {
        loader::with_env_overrides(self)
    }

    /// Parsed `model.proposal_backlink`
    pub fn backlink_path(&self) -> Result<Option<ObjectPath>, CompileError> {
        self.model
            .proposal_backlink
            .as_deref()
            .map(ObjectPath::parse)
            .transpose()
    }
}
