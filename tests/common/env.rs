//! Test environment builder for isolated CDSS testing.
//!
//! Provides `TestEnv` - a temp project directory holding a `libraries/`
//! folder, subject documents and an optional `.cdss/config.toml`, plus
//! helpers to build an engine over it or run the `cdss` binary in it.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use cdss::{DecisionEngine, EngineConfig, FileLibraryRepository, JsonPathAccessor};

/// Result of running a CDSS CLI command
#[derive(Debug)]
pub struct TestResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl TestResult {
    /// Combine stdout and stderr
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Parse every stdout line as JSON (for `--json` runs)
    pub fn json_lines(&self) -> Vec<Value> {
        self.stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("bad JSON line {l:?}: {e}")))
            .collect()
    }
}

/// Isolated test environment with temp directories.
pub struct TestEnv {
    /// Temporary project directory
    pub project_root: TempDir,
    /// Temporary directory standing in for HOME and the user config dir
    pub home_dir: TempDir,
}

impl TestEnv {
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::default()
    }

    /// Get path relative to project root
    pub fn project_path(&self, relative: &str) -> PathBuf {
        self.project_root.path().join(relative)
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.project_path("libraries")
    }

    /// Write a file below the project root
    pub fn write_project_file(&self, relative_path: &str, content: &str) {
        let full_path = self.project_path(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directories");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
    }

    /// Project config (if any) with defaults for everything else
    pub fn config(&self) -> EngineConfig {
        let path = self.project_path(".cdss/config.toml");
        if path.exists() {
            EngineConfig::load(&path).expect("project config should load")
        } else {
            EngineConfig::default()
        }
    }

    /// Engine over every library in `libraries/`, resolving includes there
    pub fn engine(&self) -> DecisionEngine {
        let repository =
            FileLibraryRepository::load_dir(&self.libraries_dir()).expect("libraries should load");
        let roots = repository.libraries().cloned().collect();
        let config = self.config();
        DecisionEngine::new(roots, Arc::new(JsonPathAccessor::from_config(&config)))
            .with_config(config)
            .with_resolver(repository)
    }

    /// Run the cdss binary from the project root
    pub fn run(&self, args: &[&str]) -> TestResult {
        self.run_from(self.project_root.path(), args)
    }

    /// Run the cdss binary from the project root with extra env vars
    pub fn run_with_env(&self, args: &[&str], env_vars: &[(&str, &str)]) -> TestResult {
        self.run_from_with_env(self.project_root.path(), args, env_vars)
    }

    pub fn run_from(&self, cwd: &Path, args: &[&str]) -> TestResult {
        self.run_from_with_env(cwd, args, &[])
    }

    pub fn run_from_with_env(&self, cwd: &Path, args: &[&str], env_vars: &[(&str, &str)]) -> TestResult {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cdss"));
        cmd.current_dir(cwd)
            .args(args)
            .env("HOME", self.home_dir.path())
            .env("XDG_CONFIG_HOME", self.home_dir.path().join(".config"))
            .env_remove("CDSS_LOG")
            .env_remove("CDSS_PROPOSAL_BACKLINK")
            .env_remove("CDSS_WRITABLE_FIELDS");
        for (key, value) in env_vars {
            cmd.env(key, value);
        }
        let output = cmd.output().expect("Failed to execute cdss");
        output_to_result(output)
    }
}

fn output_to_result(output: Output) -> TestResult {
    TestResult {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

/// Builder for TestEnv with fluent API
#[derive(Default)]
pub struct TestEnvBuilder {
    libraries: Vec<(String, String)>,
    subjects: Vec<(String, String)>,
    project_config: Option<String>,
}

impl TestEnvBuilder {
    /// Add a library document under `libraries/`
    pub fn with_library(mut self, name: &str, content: &str) -> Self {
        self.libraries.push((name.to_string(), content.to_string()));
        self
    }

    /// Add a subject document at the project root
    pub fn with_subject(mut self, name: &str, subject: &Value) -> Self {
        self.subjects.push((name.to_string(), subject.to_string()));
        self
    }

    /// Write `.cdss/config.toml`
    pub fn with_project_config(mut self, content: &str) -> Self {
        self.project_config = Some(content.to_string());
        self
    }

    pub fn build(self) -> TestEnv {
        let env = TestEnv {
            project_root: TempDir::new().expect("Failed to create project dir"),
            home_dir: TempDir::new().expect("Failed to create home dir"),
        };
        std::fs::create_dir_all(env.libraries_dir()).expect("Failed to create libraries dir");
        for (name, content) in &self.libraries {
            env.write_project_file(&format!("libraries/{name}"), content);
        }
        for (name, content) in &self.subjects {
            env.write_project_file(name, content);
        }
        if let Some(config) = &self.project_config {
            env.write_project_file(".cdss/config.toml", config);
        }
        env
    }
}
