// src/engine/fixture.rs

//! Test fixtures and their validation.
//!
//! Fixtures arrive from callers (HTTP bodies, suite files, the catalog) as
//! [`RawFixture`], where every field is optional. They are checked once,
//! up front, and turned into [`TestFixture`]. A fixture missing its input or
//! expected output is a bug in the calling layer, so the whole request is
//! rejected instead of the fixture being scored as a failure.

use serde::{Deserialize, Serialize};

use crate::error::GradeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFixture {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub hidden: bool,
}

impl TestFixture {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            hidden: false,
        }
    }

    pub fn hidden(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            hidden: true,
            ..Self::new(input, expected_output)
        }
    }
}

/// Wire / file form of a fixture, before validation.
///
/// Accepts `expected` as an alias of `expectedOutput` (and the snake_case
/// spelling used in YAML files).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFixture {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default, alias = "expected", alias = "expected_output")]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

impl From<TestFixture> for RawFixture {
    fn from(f: TestFixture) -> Self {
        Self {
            input: Some(f.input),
            expected_output: Some(f.expected_output),
            hidden: Some(f.hidden),
        }
    }
}

impl RawFixture {
    fn into_fixture(self, index: usize) -> Result<TestFixture, GradeError> {
        let input = self
            .input
            .ok_or(GradeError::MalformedFixture { index, field: "input" })?;
        let expected_output = self.expected_output.ok_or(GradeError::MalformedFixture {
            index,
            field: "expectedOutput",
        })?;

        Ok(TestFixture {
            input,
            expected_output,
            hidden: self.hidden.unwrap_or(false),
        })
    }
}

/// Validate a list of raw fixtures, failing on the first malformed one.
///
/// Indices in errors are 1-based to match how fixtures are shown to users.
pub fn parse_fixtures(raw: Vec<RawFixture>) -> Result<Vec<TestFixture>, GradeError> {
    raw.into_iter()
        .enumerate()
        .map(|(idx, f)| f.into_fixture(idx + 1))
        .collect()
}
