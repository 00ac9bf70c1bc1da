//! Configuration module for the CDSS engine
//!
//! Configuration hierarchy:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (CDSS_*)
//! 3. Project config (.cdss/config.toml)
//! 4. User config (<config dir>/cdss/config.toml)
//! 5. Built-in defaults (lowest priority)

mod loader;
mod types;

pub use loader::{ConfigWarning, PROJECT_CONFIG};
pub use types::{AccessorConfig, AnalysisConfig, EngineConfig, LimitsConfig, ModelConfig};
