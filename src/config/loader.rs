//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

use super::types::EngineConfig;

/// Project-level config file, relative to the project root
pub const PROJECT_CONFIG: &str = ".cdss/config.toml";

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown key '{}' in {}", self.key, self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", suggestion)?;
        }
        Ok(())
    }
}

/// Load configuration and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(path: &Path) -> EngineResult<(EngineConfig, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;

    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(&content);

    let config: EngineConfig = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| invalid(path, e.to_string()))?;

    check(&config, path)?;

    let warnings = unknown_paths
        .into_iter()
        .map(|path_str| {
            let key = path_str
                .split('.')
                .next_back()
                .unwrap_or(path_str.as_str())
                .to_string();
            ConfigWarning {
                key: key.clone(),
                file: path.to_path_buf(),
                line: find_line_number(&content, &key),
                suggestion: suggest_key(&key),
            }
        })
        .collect();

    Ok((config, warnings))
}

fn invalid(path: &Path, message: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig {
        file: path.to_path_buf(),
        message: message.into(),
    }
}

/// Reject values that deserialize but cannot drive an engine
fn check(config: &EngineConfig, path: &Path) -> EngineResult<()> {
    if config.limits.max_depth == 0 {
        return Err(invalid(path, "limits.max_depth must be at least 1"));
    }
    if config.model.type_key.is_empty() || config.model.id_key.is_empty() {
        return Err(invalid(path, "model keys must not be empty"));
    }
    config
        .backlink_path()
        .map_err(|e| invalid(path, format!("model.proposal_backlink: {}", e)))?;
    Ok(())
}

/// Load from project config, user config, or defaults
pub fn load_or_default(project_root: Option<&Path>) -> EngineConfig {
    let mut candidates = Vec::new();
    if let Some(root) = project_root {
        candidates.push(root.join(PROJECT_CONFIG));
    }
    if let Some(user_config_dir) = dirs::config_dir() {
        candidates.push(user_config_dir.join("cdss/config.toml"));
    }

    for candidate in candidates.iter().filter(|c| c.exists()) {
        match EngineConfig::load(candidate) {
            Ok(config) => {
                debug!(file = %candidate.display(), "loaded config");
                return with_env_overrides(config);
            }
            Err(e) => warn!(file = %candidate.display(), error = %e, "ignoring unreadable config"),
        }
    }

    with_env_overrides(EngineConfig::default())
}

/// Apply environment variable overrides (CDSS_* prefix)
pub fn with_env_overrides(config: EngineConfig) -> EngineConfig {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides from any `CDSS_*` lookup
pub(crate) fn apply_overrides(
    mut config: EngineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> EngineConfig {
    // CDSS_TYPE_KEY / CDSS_ID_KEY
    if let Some(key) = lookup("CDSS_TYPE_KEY").filter(|k| !k.is_empty()) {
        config.model.type_key = key;
    }
    if let Some(key) = lookup("CDSS_ID_KEY").filter(|k| !k.is_empty()) {
        config.model.id_key = key;
    }

    // CDSS_PROPOSAL_BACKLINK (empty disables)
    if let Some(path) = lookup("CDSS_PROPOSAL_BACKLINK") {
        config.model.proposal_backlink = Some(path).filter(|p| !p.is_empty());
    }

    // CDSS_CASE_INSENSITIVE
    if let Some(val) = lookup("CDSS_CASE_INSENSITIVE") {
        config.accessor.case_insensitive = val.to_lowercase() != "false" && val != "0";
    }

    // CDSS_WRITABLE_FIELDS (comma-separated)
    if let Some(fields) = lookup("CDSS_WRITABLE_FIELDS") {
        config.analysis.writable_fields = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
    }

    // CDSS_MAX_DEPTH / CDSS_MAX_ITERATIONS
    if let Some(depth) = lookup("CDSS_MAX_DEPTH").and_then(|v| v.parse().ok()) {
        if depth > 0 {
            config.limits.max_depth = depth;
        }
    }
    if let Some(iterations) = lookup("CDSS_MAX_ITERATIONS").and_then(|v| v.parse().ok()) {
        config.limits.max_iterations = iterations;
    }

    config
}

fn find_line_number(content: &str, needle: &str) -> Option<usize> {
    content
        .lines()
        .position(|line| line.contains(needle))
        .map(|i| i + 1)
}

fn suggest_key(unknown: &str) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "model",
        "type_key",
        "id_key",
        "protocols_key",
        "proposal_backlink",
        "accessor",
        "classifier_fields",
        "case_insensitive",
        "analysis",
        "writable_fields",
        "limits",
        "max_depth",
        "max_iterations",
    ];

    let mut best: Option<(&str, usize)> = None;
    for candidate in CANDIDATES {
        let dist = levenshtein(unknown, candidate);
        best = match best {
            None => Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => Some((candidate, dist)),
            Some(current) => Some(current),
        };
    }

    match best {
        Some((candidate, dist)) if dist <= 2 => Some(candidate.to_string()),
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = usize::from(ac != bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}
