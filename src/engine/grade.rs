// src/engine/grade.rs

//! Test case grading.
//!
//! **Normalization rules (all languages):**
//! - Canonical value extracted from the output (see `extract`)
//! - Leading / trailing whitespace trimmed on both sides
//! - Case sensitive, internal whitespace preserved
//!
//! `Comparison::Structural` additionally treats two values as equal when
//! both parse as JSON and the parsed values are equal, so `[1, 2]` matches
//! `[1,2]`. Numbers keep their JSON type: `1` does not equal `1.0`.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::extract::{extract_with_marker, DEFAULT_RESULT_MARKER};
use super::fixture::{parse_fixtures, RawFixture, TestFixture};
use super::validate::ValidationReport;
use super::{Engine, TestCaseResult};
use crate::catalog::FixtureSource;
use crate::config::Config;
use crate::error::GradeError;
use crate::runners::{Runner, RunnerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    #[default]
    Exact,
    Structural,
}

impl Comparison {
    pub fn matches(self, actual: &str, expected: &str) -> bool {
        let actual = actual.trim();
        let expected = expected.trim();

        match self {
            Comparison::Exact => actual == expected,
            Comparison::Structural => {
                match (
                    serde_json::from_str::<Value>(actual),
                    serde_json::from_str::<Value>(expected),
                ) {
                    (Ok(a), Ok(e)) => a == e,
                    _ => actual == expected,
                }
            }
        }
    }
}

/// Runs fixtures through the engine and scores the outcome.
#[derive(Clone)]
pub struct Grader {
    engine: Engine,
    comparison: Comparison,
    marker: String,
    max_parallel: usize,
    threshold: u8,
}

impl Grader {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            comparison: Comparison::default(),
            marker: DEFAULT_RESULT_MARKER.to_string(),
            max_parallel: 1,
            threshold: 70,
        }
    }

    pub fn from_config(cfg: &Config, registry: Arc<RunnerRegistry>) -> Self {
        let engine = Engine::new(registry, Duration::from_millis(cfg.execution.timeout_ms));
        Self::new(engine)
            .with_comparison(cfg.grading.comparison)
            .with_marker(&cfg.grading.result_marker)
            .with_max_parallel(cfg.execution.max_parallel_fixtures)
            .with_threshold(cfg.grading.threshold)
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = marker.to_string();
        self
    }

    /// Per-request cap on fixtures executing at the same time.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.min(100);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Grade `code` against each fixture.
    ///
    /// Results come back in fixture order. A fixture that fails, crashes or
    /// times out is recorded and grading moves on. Only an unsupported
    /// language fails the call, before anything runs.
    #[instrument(skip_all, fields(language = %language, fixtures = fixtures.len()))]
    pub async fn run_fixtures(
        &self,
        code: &str,
        language: &str,
        fixtures: &[TestFixture],
    ) -> Result<Vec<TestCaseResult>, GradeError> {
        let runner = self.engine.registry().resolve(language)?;
        let runner = runner.as_ref();

        // Collected first: a stream over a borrowing closure is not `Send`.
        let pending: Vec<_> = fixtures
            .iter()
            .map(|fixture| self.grade_one(runner, code, fixture))
            .collect();

        let results: Vec<TestCaseResult> = stream::iter(pending)
            .buffered(self.max_parallel)
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.passed).count();
        info!(passed, total = results.len(), "fixtures graded");

        Ok(results)
    }

    /// Like [`Grader::run_fixtures`] for unvalidated fixtures; a malformed
    /// fixture rejects the whole request.
    pub async fn run_raw_fixtures(
        &self,
        code: &str,
        language: &str,
        fixtures: Vec<RawFixture>,
    ) -> Result<Vec<TestCaseResult>, GradeError> {
        let fixtures = parse_fixtures(fixtures)?;
        self.run_fixtures(code, language, &fixtures).await
    }

    /// Grade and score against an explicit threshold.
    pub async fn validate(
        &self,
        code: &str,
        language: &str,
        fixtures: &[TestFixture],
        threshold: u8,
    ) -> Result<ValidationReport, GradeError> {
        let results = self.run_fixtures(code, language, fixtures).await?;
        Ok(ValidationReport::from_results(results, threshold))
    }

    /// Grade against the fixtures registered for an algorithm, using the
    /// grader's configured threshold.
    pub async fn validate_algorithm(
        &self,
        algorithm_id: u32,
        code: &str,
        language: &str,
        source: &dyn FixtureSource,
    ) -> Result<ValidationReport, GradeError> {
        let fixtures = source.fixtures_for(algorithm_id)?;
        self.validate(code, language, &fixtures, self.threshold).await
    }

    async fn grade_one(
        &self,
        runner: &dyn Runner,
        code: &str,
        fixture: &TestFixture,
    ) -> TestCaseResult {
        let execution = self
            .engine
            .execute_with(runner, code, Some(fixture.input.as_str()))
            .await;

        if !execution.success {
            debug!(error = ?execution.error, "fixture execution failed");
            return TestCaseResult {
                fixture: fixture.clone(),
                passed: false,
                actual_output: String::new(),
                execution_time_ms: execution.execution_time_ms,
                error: execution.error,
            };
        }

        let actual = extract_with_marker(&execution.output, &self.marker);
        let passed = self.comparison.matches(&actual, &fixture.expected_output);

        TestCaseResult {
            fixture: fixture.clone(),
            passed,
            actual_output: actual,
            execution_time_ms: execution.execution_time_ms,
            error: None,
        }
    }
}
