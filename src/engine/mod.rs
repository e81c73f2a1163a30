use serde::{Deserialize, Serialize};

pub mod execute;
pub mod extract;
pub mod fixture;
pub mod grade;
pub mod validate;

pub use execute::Engine;
pub use extract::extract_canonical_result;
pub use fixture::{RawFixture, TestFixture};
pub use grade::{Comparison, Grader};
pub use validate::ValidationReport;

pub const TIMEOUT_MESSAGE: &str = "execution timed out";
pub const OUTPUT_LIMIT_MESSAGE: &str = "output limit exceeded";

/* ---------------- execution input ---------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub input: Option<String>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/* ---------------- execution output ---------------- */

/// Why a run did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionErrorKind {
    /// The runner itself broke (spawn failure, IO error, bad toolchain).
    Fault,
    /// The program exceeded its time budget.
    Timeout,
    /// The program did not compile.
    Compile,
    /// The program ran and exited unsuccessfully.
    Runtime,
}

/// Outcome of a single execution.
///
/// Construct through [`ExecutionResult::succeeded`] / [`ExecutionResult::failed`]
/// so that a failed result never carries output and a successful one never
/// carries an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ExecutionErrorKind>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_kb: Option<u64>,
}

impl ExecutionResult {
    pub fn succeeded(output: String, execution_time_ms: u64, memory_usage_kb: Option<u64>) -> Self {
        Self {
            success: true,
            output,
            error: None,
            error_kind: None,
            execution_time_ms,
            memory_usage_kb,
        }
    }

    pub fn failed(
        kind: ExecutionErrorKind,
        error: impl Into<String>,
        execution_time_ms: u64,
        memory_usage_kb: Option<u64>,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = match kind {
                ExecutionErrorKind::Fault => "execution fault".to_string(),
                ExecutionErrorKind::Timeout => TIMEOUT_MESSAGE.to_string(),
                ExecutionErrorKind::Compile => "compilation failed".to_string(),
                ExecutionErrorKind::Runtime => "program exited with an error".to_string(),
            };
        }

        Self {
            success: false,
            output: String::new(),
            error: Some(error),
            error_kind: Some(kind),
            execution_time_ms,
            memory_usage_kb,
        }
    }

    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::failed(ExecutionErrorKind::Timeout, TIMEOUT_MESSAGE, timeout_ms, None)
    }
}

/* ---------------- per-fixture result ---------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub fixture: TestFixture,
    pub passed: bool,
    pub actual_output: String,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCaseResult {
    /// Copy with the expected and actual values of a hidden fixture blanked,
    /// for results that leave the service.
    pub fn redacted(&self) -> Self {
        if !self.fixture.hidden {
            return self.clone();
        }

        Self {
            fixture: TestFixture {
                input: String::new(),
                expected_output: String::new(),
                hidden: true,
            },
            passed: self.passed,
            actual_output: String::new(),
            execution_time_ms: self.execution_time_ms,
            error: self.error.as_ref().map(|_| "hidden test case failed".to_string()),
        }
    }
}
