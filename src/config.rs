// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::engine::extract::DEFAULT_RESULT_MARKER;
use crate::engine::Comparison;

pub const DEFAULT_CONFIG_FILE: &str = "algograde.yaml";

/// Root configuration loaded from `algograde.yaml`.
///
/// This file controls:
/// - Time budgets and per-request fixture parallelism
/// - The scoring threshold and output comparison policy
/// - Which toolchain binaries run each language
/// - Where the fixture catalog lives
///
/// Every section is optional; a missing file means built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub grading: GradingConfig,

    /// Toolchain binaries
    #[serde(default)]
    pub runtime: Runtime,

    /// Extra environment variables passed to every program.
    ///
    /// Programs otherwise start with a cleared environment (PATH only).
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Optional fixture catalog file. The built-in catalog is used when unset.
    #[serde(default)]
    pub catalog: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Execution budgets.
///
/// Example:
///
/// execution:
///   timeout_ms: 2000
///   max_parallel_fixtures: 4
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock budget for one program run, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Budget for the compile step of compiled languages
    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,

    /// Fixtures of one request that may run at the same time
    #[serde(default = "default_parallel")]
    pub max_parallel_fixtures: usize,

    /// Memory sampling interval for the peak RSS tracker
    #[serde(default = "default_memory_sample_ms")]
    pub memory_sample_ms: u64,

    /// Cap on what a program may write to stdout, and separately to stderr
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            compile_timeout_ms: default_compile_timeout_ms(),
            max_parallel_fixtures: default_parallel(),
            memory_sample_ms: default_memory_sample_ms(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_compile_timeout_ms() -> u64 {
    10_000
}

fn default_parallel() -> usize {
    1
}

fn default_memory_sample_ms() -> u64 {
    20
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

/// Scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Minimum score (0-100) for a submission to count as valid
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    #[serde(default)]
    pub comparison: Comparison,

    /// Line prefix marking the graded value in program output
    #[serde(default = "default_marker")]
    pub result_marker: String,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            comparison: Comparison::default(),
            result_marker: default_marker(),
        }
    }
}

fn default_threshold() -> u8 {
    70
}

fn default_marker() -> String {
    DEFAULT_RESULT_MARKER.to_string()
}

/// Runtime binary configuration.
///
/// Example:
///
/// runtime:
///   node: node
///   python: python3
///   cxx: clang++
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runtime {
    #[serde(default = "default_node")]
    pub node: String,

    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_javac")]
    pub javac: String,

    #[serde(default = "default_java")]
    pub java: String,

    #[serde(default = "default_cxx")]
    pub cxx: String,

    /// Function the JS/Python harness calls with the parsed input
    #[serde(default = "default_entry")]
    pub entry: String,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            node: default_node(),
            python: default_python(),
            javac: default_javac(),
            java: default_java(),
            cxx: default_cxx(),
            entry: default_entry(),
        }
    }
}

fn default_node() -> String {
    "node".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_javac() -> String {
    "javac".to_string()
}

fn default_java() -> String {
    "java".to_string()
}

fn default_cxx() -> String {
    "g++".to_string()
}

fn default_entry() -> String {
    "solve".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> String {
    "127.0.0.1:8787".to_string()
}

/* ---------------- checks ---------------- */

#[derive(Debug, Serialize)]
pub struct ConfigIssue {
    pub code: &'static str,
    pub message: String,
}

impl Config {
    /// Load and parse a config file, then check it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let cfg: Config = serde_yaml::from_str(&raw).context("Failed to parse YAML config")?;
        cfg.ensure_valid()?;

        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Every problem found, in a stable order.
    pub fn check(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut push = |code: &'static str, message: String| {
            issues.push(ConfigIssue { code, message });
        };

        if self.execution.timeout_ms == 0 {
            push("TIMEOUT_INVALID", "execution.timeout_ms must be greater than zero".to_string());
        }
        if self.execution.compile_timeout_ms == 0 {
            push(
                "COMPILE_TIMEOUT_INVALID",
                "execution.compile_timeout_ms must be greater than zero".to_string(),
            );
        }
        if self.execution.max_parallel_fixtures == 0 {
            push(
                "PARALLELISM_INVALID",
                "execution.max_parallel_fixtures must be at least 1".to_string(),
            );
        }
        if self.execution.memory_sample_ms == 0 {
            push(
                "MEMORY_SAMPLE_INVALID",
                "execution.memory_sample_ms must be greater than zero".to_string(),
            );
        }
        if self.execution.max_output_bytes == 0 {
            push(
                "OUTPUT_LIMIT_INVALID",
                "execution.max_output_bytes must be greater than zero".to_string(),
            );
        }
        if self.grading.threshold > 100 {
            push(
                "THRESHOLD_INVALID",
                format!("grading.threshold must be 0-100, got {}", self.grading.threshold),
            );
        }
        if self.grading.result_marker.trim().is_empty() {
            push("MARKER_EMPTY", "grading.result_marker must not be empty".to_string());
        }

        let binaries = [
            ("node", &self.runtime.node),
            ("python", &self.runtime.python),
            ("javac", &self.runtime.javac),
            ("java", &self.runtime.java),
            ("cxx", &self.runtime.cxx),
        ];
        for (name, value) in binaries {
            if value.trim().is_empty() {
                push("RUNTIME_MISSING", format!("runtime.{} is not configured", name));
            }
        }
        if self.runtime.entry.trim().is_empty() {
            push("ENTRY_MISSING", "runtime.entry must name a function".to_string());
        }

        issues
    }

    pub fn ensure_valid(&self) -> Result<()> {
        let issues = self.check();
        if issues.is_empty() {
            return Ok(());
        }

        let lines: Vec<String> = issues
            .iter()
            .map(|i| format!("  [{}] {}", i.code, i.message))
            .collect();
        bail!("Invalid configuration:\n{}", lines.join("\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.execution.timeout_ms, 2000);
        assert_eq!(cfg.execution.max_parallel_fixtures, 1);
        assert_eq!(cfg.execution.max_output_bytes, 1024 * 1024);
        assert_eq!(cfg.grading.threshold, 70);
        assert_eq!(cfg.grading.comparison, Comparison::Exact);
        assert_eq!(cfg.grading.result_marker, "Result:");
        assert_eq!(cfg.runtime.python, "python3");
        assert!(cfg.check().is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "grading:\n  threshold: 90\n  comparison: structural\nruntime:\n  python: python3.12\n",
        )
        .unwrap();
        assert_eq!(cfg.grading.threshold, 90);
        assert_eq!(cfg.grading.comparison, Comparison::Structural);
        assert_eq!(cfg.runtime.python, "python3.12");
        assert_eq!(cfg.runtime.node, "node");
        assert_eq!(cfg.execution.timeout_ms, 2000);
    }

    #[test]
    fn test_check_reports_every_issue() {
        let mut cfg = Config::default();
        cfg.execution.timeout_ms = 0;
        cfg.grading.threshold = 120;
        cfg.runtime.node = " ".to_string();

        let codes: Vec<&str> = cfg.check().iter().map(|i| i.code).collect();
        assert_eq!(codes, vec!["TIMEOUT_INVALID", "THRESHOLD_INVALID", "RUNTIME_MISSING"]);
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn test_zero_output_cap_is_rejected() {
        let mut cfg = Config::default();
        cfg.execution.max_output_bytes = 0;

        let codes: Vec<&str> = cfg.check().iter().map(|i| i.code).collect();
        assert_eq!(codes, vec!["OUTPUT_LIMIT_INVALID"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "execution:\n  timeout_ms: 500\nenv:\n  SEED: \"7\"").unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.execution.timeout_ms, 500);
        assert_eq!(cfg.env.get("SEED").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "execution:\n  max_parallel_fixtures: 0").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("PARALLELISM_INVALID"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(cfg.grading.threshold, 70);
    }
}
