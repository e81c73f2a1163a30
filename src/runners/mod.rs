// src/runners/mod.rs

//! Language runners and the registry that maps language ids onto them.
//!
//! A runner owns all language-specific mechanics (writing sources,
//! compiling, launching an interpreter). The rest of the pipeline only sees
//! [`RawRunResult`].
//!
//! Runner contract:
//! - identical (code, input) gives identical output
//! - a run never outlives its timeout; it reports `timed_out` instead
//! - output is capped; a flood reports `output_limit_exceeded`
//! - internal problems become `fault` text, never a panic or an `Err`

pub mod process;
pub mod scripted;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::GradeError;
use crate::language::LanguageId;

pub use process::{ProcessRunner, Toolchain};
pub use scripted::ScriptedRunner;

/// Everything a runner observed about one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRunResult {
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// The program wrote more than the output cap and was killed.
    pub output_limit_exceeded: bool,
    /// Exit code of the program, `None` if it never exited on its own.
    pub exit_code: Option<i32>,
    /// Infrastructure failure inside the runner (not the user's program).
    pub fault: Option<String>,
    /// Compiler diagnostics when the program failed to build.
    pub compile_error: Option<String>,
    /// Peak resident memory, when the runner could sample it.
    pub memory_kb: Option<u64>,
}

impl RawRunResult {
    pub fn completed(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            ..Self::default()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    pub fn output_limit_exceeded() -> Self {
        Self {
            output_limit_exceeded: true,
            ..Self::default()
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            fault: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn compile_failed(diagnostics: impl Into<String>) -> Self {
        Self {
            compile_error: Some(diagnostics.into()),
            ..Self::default()
        }
    }

    pub fn with_memory(mut self, memory_kb: Option<u64>) -> Self {
        self.memory_kb = memory_kb;
        self
    }
}

#[async_trait]
pub trait Runner: Send + Sync {
    /// Canonical language id this runner serves.
    fn language(&self) -> &str;

    /// Time the runner may spend before the program itself starts
    /// (compilation). The engine adds it to the run timeout when bounding
    /// the call.
    fn overhead(&self) -> Duration {
        Duration::ZERO
    }

    async fn run(&self, code: &str, input: Option<&str>, timeout: Duration) -> RawRunResult;
}

/// Static mapping from language id to runner.
///
/// Built once at startup and only read afterwards, so it can be shared
/// across concurrent requests behind an `Arc` without locking.
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: BTreeMap<LanguageId, Arc<dyn Runner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the toolchain-backed runners for every built-in
    /// language.
    pub fn from_config(cfg: &Config) -> Self {
        let mut registry = Self::new();
        for toolchain in Toolchain::builtin(cfg) {
            registry.register(Arc::new(ProcessRunner::new(toolchain, cfg)));
        }
        registry
    }

    /// Register (or replace) the runner for its language.
    pub fn register(&mut self, runner: Arc<dyn Runner>) {
        let id = LanguageId::new(runner.language());
        self.runners.insert(id, runner);
    }

    pub fn with(mut self, runner: Arc<dyn Runner>) -> Self {
        self.register(runner);
        self
    }

    pub fn resolve(&self, language: &str) -> Result<Arc<dyn Runner>, GradeError> {
        self.runners
            .get(&LanguageId::new(language))
            .cloned()
            .ok_or_else(|| GradeError::UnsupportedLanguage(language.to_string()))
    }

    pub fn languages(&self) -> Vec<String> {
        self.runners.keys().map(|id| id.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_languages_are_registered() {
        let registry = RunnerRegistry::from_config(&Config::default());
        assert_eq!(
            registry.languages(),
            vec!["cpp", "java", "javascript", "python"]
        );
    }

    #[test]
    fn test_resolve_uses_aliases() {
        let registry = RunnerRegistry::from_config(&Config::default());
        assert_eq!(registry.resolve("C++").unwrap().language(), "cpp");
        assert_eq!(registry.resolve("js").unwrap().language(), "javascript");
    }

    #[test]
    fn test_unknown_language_is_an_error() {
        let registry = RunnerRegistry::from_config(&Config::default());
        match registry.resolve("brainfuck") {
            Err(GradeError::UnsupportedLanguage(lang)) => assert_eq!(lang, "brainfuck"),
            _ => panic!("expected UnsupportedLanguage"),
        }
    }

    #[test]
    fn test_register_new_language() {
        let registry = RunnerRegistry::new().with(Arc::new(ScriptedRunner::echo("ruby")));
        assert!(registry.resolve("ruby").is_ok());
        assert!(registry.resolve("python").is_err());
    }
}
