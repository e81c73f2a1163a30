// src/error.rs

//! Domain errors for the execution and grading core.
//!
//! Only request-level problems are errors. Anything that goes wrong while a
//! submitted program runs (faults, timeouts, crashes, wrong answers) is
//! reported as data inside `ExecutionResult` / `TestCaseResult` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradeError {
    /// No runner is registered for the requested language.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A fixture handed in by the caller is missing a required field.
    #[error("malformed fixture #{index}: missing `{field}`")]
    MalformedFixture { index: usize, field: &'static str },

    /// The fixture source has no entry for this algorithm id.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(u32),

    /// The fixture catalog could not be loaded or parsed.
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl GradeError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            GradeError::MalformedFixture { .. } => "MALFORMED_FIXTURE",
            GradeError::UnknownAlgorithm(_) => "UNKNOWN_ALGORITHM",
            GradeError::Catalog(_) => "CATALOG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = GradeError::UnsupportedLanguage("cobol".to_string());
        assert_eq!(err.to_string(), "unsupported language: cobol");

        let err = GradeError::MalformedFixture {
            index: 2,
            field: "expectedOutput",
        };
        assert_eq!(err.to_string(), "malformed fixture #2: missing `expectedOutput`");
        assert_eq!(err.code(), "MALFORMED_FIXTURE");
    }
}
