// src/engine/execute.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::{ExecutionErrorKind, ExecutionRequest, ExecutionResult, OUTPUT_LIMIT_MESSAGE};
use crate::error::GradeError;
use crate::runners::{RawRunResult, Runner, RunnerRegistry};

/// Slack past the runner's own deadline so a runner that kills its child
/// on time still gets to report the timeout with its memory sample.
const DEADLINE_GRACE: Duration = Duration::from_millis(500);

/// Runs one submission against one input.
///
/// The engine holds nothing but the read-only registry and a timeout, so a
/// single instance can serve any number of concurrent requests.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<RunnerRegistry>,
    timeout: Duration,
}

impl Engine {
    pub fn new(registry: Arc<RunnerRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn registry(&self) -> &RunnerRegistry {
        &self.registry
    }

    /// Execute a request.
    ///
    /// An unknown language is the only error; the runner is not invoked and
    /// no timer is started. Everything that happens while the program runs is
    /// reported in the returned `ExecutionResult`.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, GradeError> {
        let runner = self.registry.resolve(&request.language)?;
        Ok(self
            .execute_with(runner.as_ref(), &request.code, request.input.as_deref())
            .await)
    }

    /// Execute with an already resolved runner.
    #[instrument(
        skip_all,
        fields(language = runner.language(), timeout_ms = self.timeout.as_millis() as u64)
    )]
    pub async fn execute_with(
        &self,
        runner: &dyn Runner,
        code: &str,
        input: Option<&str>,
    ) -> ExecutionResult {
        let start = Instant::now();

        // The runner enforces the timeout itself; this outer deadline only
        // bounds a runner that fails to.
        let deadline = self.timeout + runner.overhead() + DEADLINE_GRACE;
        let run = runner.run(code, input, self.timeout);
        let raw = match tokio::time::timeout(deadline, run).await {
            Ok(raw) => raw,
            Err(_) => {
                warn!("runner ignored its timeout; abandoned");
                RawRunResult::timed_out()
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let result = self.normalize(raw, elapsed_ms);

        debug!(
            success = result.success,
            kind = ?result.error_kind,
            execution_ms = result.execution_time_ms,
            memory_kb = result.memory_usage_kb,
            "execution finished"
        );

        result
    }

    fn normalize(&self, raw: RawRunResult, elapsed_ms: u64) -> ExecutionResult {
        let memory = raw.memory_kb;

        if raw.timed_out {
            let mut result = ExecutionResult::timed_out(self.timeout.as_millis() as u64);
            result.memory_usage_kb = memory;
            return result;
        }

        if let Some(fault) = raw.fault {
            return ExecutionResult::failed(ExecutionErrorKind::Fault, fault, elapsed_ms, memory);
        }

        if let Some(diagnostics) = raw.compile_error {
            return ExecutionResult::failed(
                ExecutionErrorKind::Compile,
                format!("compilation failed: {}", diagnostics.trim()),
                elapsed_ms,
                memory,
            );
        }

        if raw.output_limit_exceeded {
            return ExecutionResult::failed(
                ExecutionErrorKind::Runtime,
                OUTPUT_LIMIT_MESSAGE,
                elapsed_ms,
                memory,
            );
        }

        match raw.exit_code {
            Some(0) => ExecutionResult::succeeded(raw.stdout, elapsed_ms, memory),
            code => {
                let detail = raw.stderr.trim();
                let message = if !detail.is_empty() {
                    detail.to_string()
                } else {
                    match code {
                        Some(c) => format!("program exited with status {}", c),
                        None => "program was terminated by a signal".to_string(),
                    }
                };
                ExecutionResult::failed(ExecutionErrorKind::Runtime, message, elapsed_ms, memory)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::ScriptedRunner;
    use std::sync::atomic::Ordering;

    fn engine_with(runner: ScriptedRunner) -> Engine {
        let registry = RunnerRegistry::new().with(Arc::new(runner));
        Engine::new(Arc::new(registry), Duration::from_millis(2000))
    }

    #[tokio::test]
    async fn test_trivial_program_succeeds() {
        let engine = engine_with(ScriptedRunner::new("python", |_, _| {
            RawRunResult::completed("hello\n", "", 0)
        }));

        let result = engine
            .execute(&ExecutionRequest::new("print('hello')", "python"))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("hello"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_language_never_runs() {
        let runner = ScriptedRunner::echo("python");
        let calls = runner.calls();
        let engine = engine_with(runner);

        let err = engine
            .execute(&ExecutionRequest::new("x", "fortran"))
            .await
            .unwrap_err();

        assert!(matches!(err, GradeError::UnsupportedLanguage(ref l) if l == "fortran"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execution_is_idempotent() {
        let engine = engine_with(ScriptedRunner::new("javascript", |code, input| {
            RawRunResult::completed(format!("{}:{}", code.len(), input.unwrap_or("")), "", 0)
        }));
        let request = ExecutionRequest::new("abc", "javascript").with_input("[1]");

        let a = engine.execute(&request).await.unwrap();
        let b = engine.execute(&request).await.unwrap();
        assert_eq!(a.output, b.output);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_terminating_program_times_out() {
        let engine = engine_with(ScriptedRunner::hang("python"));
        let start = Instant::now();

        let result = engine
            .execute(&ExecutionRequest::new("while True: pass", "python"))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("execution timed out"));
        assert_eq!(result.error_kind, Some(ExecutionErrorKind::Timeout));
        assert_eq!(result.execution_time_ms, 2000);
        assert!(result.output.is_empty());
        assert!(start.elapsed() <= Duration::from_millis(2100));
    }

    struct StuckRunner;

    #[async_trait::async_trait]
    impl Runner for StuckRunner {
        fn language(&self) -> &str {
            "stuck"
        }

        async fn run(&self, _code: &str, _input: Option<&str>, _timeout: Duration) -> RawRunResult {
            std::future::pending::<RawRunResult>().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_bounds_a_runner_that_ignores_timeout() {
        let registry = RunnerRegistry::new().with(Arc::new(StuckRunner));
        let engine = Engine::new(Arc::new(registry), Duration::from_millis(2000));
        let start = Instant::now();

        let result = engine.execute(&ExecutionRequest::new("", "stuck")).await.unwrap();

        assert_eq!(result.error.as_deref(), Some("execution timed out"));
        assert_eq!(result.execution_time_ms, 2000);
        assert!(start.elapsed() <= Duration::from_millis(2000) + DEADLINE_GRACE);
    }

    /// Kills its child a little after the timeout, like a real process runner
    /// under load, and reports the sampled memory.
    struct LateKillRunner;

    #[async_trait::async_trait]
    impl Runner for LateKillRunner {
        fn language(&self) -> &str {
            "late"
        }

        async fn run(&self, _code: &str, _input: Option<&str>, timeout: Duration) -> RawRunResult {
            tokio::time::sleep(timeout + Duration::from_millis(100)).await;
            RawRunResult::timed_out().with_memory(Some(14072))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_runner_timeout_keeps_memory() {
        let registry = RunnerRegistry::new().with(Arc::new(LateKillRunner));
        let engine = Engine::new(Arc::new(registry), Duration::from_millis(2000));

        let result = engine.execute(&ExecutionRequest::new("", "late")).await.unwrap();

        assert_eq!(result.error_kind, Some(ExecutionErrorKind::Timeout));
        assert_eq!(result.execution_time_ms, 2000);
        assert_eq!(result.memory_usage_kb, Some(14072));
    }

    #[tokio::test]
    async fn test_output_flood_is_a_runtime_error() {
        let engine = engine_with(ScriptedRunner::new("python", |_, _| {
            RawRunResult::output_limit_exceeded().with_memory(Some(9000))
        }));

        let result = engine.execute(&ExecutionRequest::new("", "python")).await.unwrap();
        assert!(!result.success);
        assert!(result.output.is_empty());
        assert_eq!(result.error_kind, Some(ExecutionErrorKind::Runtime));
        assert_eq!(result.error.as_deref(), Some("output limit exceeded"));
        assert_eq!(result.memory_usage_kb, Some(9000));
    }

    #[tokio::test]
    async fn test_fault_is_reported_as_error() {
        let engine = engine_with(ScriptedRunner::new("java", |_, _| {
            RawRunResult::fault("Failed to spawn `java`")
        }));

        let result = engine.execute(&ExecutionRequest::new("", "java")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ExecutionErrorKind::Fault));
        assert_eq!(result.error.as_deref(), Some("Failed to spawn `java`"));
    }

    #[tokio::test]
    async fn test_compile_error() {
        let engine = engine_with(ScriptedRunner::new("cpp", |_, _| {
            RawRunResult::compile_failed("main.cpp:1: error: expected ';'")
        }));

        let result = engine.execute(&ExecutionRequest::new("", "cpp")).await.unwrap();
        assert_eq!(result.error_kind, Some(ExecutionErrorKind::Compile));
        assert!(result.error.unwrap().starts_with("compilation failed: main.cpp:1"));
    }

    #[tokio::test]
    async fn test_program_error_discards_stdout() {
        let engine = engine_with(ScriptedRunner::new("python", |_, _| {
            RawRunResult::completed("partial", "ZeroDivisionError: division by zero\n", 1)
        }));

        let result = engine.execute(&ExecutionRequest::new("", "python")).await.unwrap();
        assert!(!result.success);
        assert!(result.output.is_empty());
        assert_eq!(result.error_kind, Some(ExecutionErrorKind::Runtime));
        assert_eq!(result.error.as_deref(), Some("ZeroDivisionError: division by zero"));
    }

    #[tokio::test]
    async fn test_silent_crash_gets_status_message() {
        let engine = engine_with(ScriptedRunner::new("cpp", |_, _| RawRunResult {
            exit_code: None,
            ..RawRunResult::default()
        }));

        let result = engine.execute(&ExecutionRequest::new("", "cpp")).await.unwrap();
        assert_eq!(result.error.as_deref(), Some("program was terminated by a signal"));
    }

    #[tokio::test]
    async fn test_memory_is_passed_through() {
        let engine = engine_with(ScriptedRunner::new("python", |_, _| {
            RawRunResult::completed("1", "", 0).with_memory(Some(2048))
        }));

        let result = engine.execute(&ExecutionRequest::new("", "python")).await.unwrap();
        assert_eq!(result.memory_usage_kb, Some(2048));
    }
}
