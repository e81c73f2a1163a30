// src/engine/validate.rs

//! Scoring policy.
//!
//! - score = round(100 * passed / total), 0 when there are no fixtures
//! - valid = score >= threshold, never valid without fixtures
//! - feedback = band message for the score, then one line per failed
//!   visible fixture; failed hidden fixtures are only counted

use serde::{Deserialize, Serialize};

use super::TestCaseResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub score: u8,
    pub passed_count: usize,
    pub total_count: usize,
    pub is_valid: bool,
    pub per_case_results: Vec<TestCaseResult>,
    pub feedback: Vec<String>,
}

impl ValidationReport {
    pub fn from_results(results: Vec<TestCaseResult>, threshold: u8) -> Self {
        let passed_count = results.iter().filter(|r| r.passed).count();
        let total_count = results.len();
        let score = score(passed_count, total_count);
        let is_valid = total_count > 0 && score >= threshold;
        let feedback = feedback(score, &results);

        Self {
            score,
            passed_count,
            total_count,
            is_valid,
            per_case_results: results,
            feedback,
        }
    }

    /// Copy safe to show to the submitter: hidden fixtures keep their
    /// pass/fail status but lose input, expected and actual values.
    pub fn redacted(&self) -> Self {
        Self {
            per_case_results: self.per_case_results.iter().map(TestCaseResult::redacted).collect(),
            ..self.clone()
        }
    }
}

/// Percentage of passed fixtures, rounded half up.
pub fn score(passed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let passed = passed.min(total);
    ((200 * passed + total) / (2 * total)) as u8
}

pub fn feedback(score: u8, results: &[TestCaseResult]) -> Vec<String> {
    let mut lines: Vec<String> = band_message(score).iter().map(|s| s.to_string()).collect();

    if results.is_empty() {
        lines.push("No test cases were run, so nothing was verified.".to_string());
        return lines;
    }

    let failed_visible: Vec<(usize, &TestCaseResult)> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.passed && !r.fixture.hidden)
        .collect();
    let failed_hidden = results
        .iter()
        .filter(|r| !r.passed && r.fixture.hidden)
        .count();

    if !failed_visible.is_empty() {
        lines.push("Failed test cases:".to_string());
        for (idx, r) in failed_visible {
            let got = match &r.error {
                Some(err) => format!("error: {}", err.lines().next().unwrap_or_default()),
                None => r.actual_output.clone(),
            };
            lines.push(format!(
                "Test {}: expected {}, got {}",
                idx + 1,
                r.fixture.expected_output.trim(),
                got
            ));
        }
    }

    if failed_hidden > 0 {
        let noun = if failed_hidden == 1 { "case" } else { "cases" };
        lines.push(format!("{} hidden test {} failed.", failed_hidden, noun));
    }

    lines
}

fn band_message(score: u8) -> [&'static str; 2] {
    match score {
        100 => [
            "Perfect! All test cases passed.",
            "Your implementation is correct and handles all edge cases.",
        ],
        75..=99 => [
            "Good job! Most test cases passed.",
            "Review the failed test cases to improve your solution.",
        ],
        50..=74 => [
            "Your solution works for some cases but needs improvement.",
            "Check your algorithm logic and edge case handling.",
        ],
        _ => [
            "Your solution needs significant improvements.",
            "Review the algorithm description and try again.",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TestFixture;

    fn case(fixture: TestFixture, passed: bool, actual: &str) -> TestCaseResult {
        TestCaseResult {
            fixture,
            passed,
            actual_output: actual.to_string(),
            execution_time_ms: 1,
            error: None,
        }
    }

    #[test]
    fn test_score_rounding() {
        assert_eq!(score(4, 4), 100);
        assert_eq!(score(2, 4), 50);
        assert_eq!(score(1, 3), 33);
        assert_eq!(score(2, 3), 67);
        assert_eq!(score(1, 8), 13); // 12.5 rounds up
        assert_eq!(score(0, 5), 0);
    }

    #[test]
    fn test_score_is_monotonic() {
        for total in 1..=25 {
            let mut last = 0;
            for passed in 0..=total {
                let s = score(passed, total);
                assert!(s >= last, "score({}, {}) decreased", passed, total);
                last = s;
            }
            assert_eq!(last, 100);
        }
    }

    #[test]
    fn test_empty_fixture_list_is_never_valid() {
        let report = ValidationReport::from_results(Vec::new(), 0);
        assert_eq!(report.score, 0);
        assert_eq!(report.total_count, 0);
        assert!(!report.is_valid);
        assert!(report.feedback.iter().any(|l| l.contains("nothing was verified")));
    }

    #[test]
    fn test_threshold_boundary() {
        let results = vec![
            case(TestFixture::new("a", "1"), true, "1"),
            case(TestFixture::new("b", "2"), true, "2"),
            case(TestFixture::new("c", "3"), true, "3"),
            case(TestFixture::new("d", "4"), false, "0"),
        ];
        let report = ValidationReport::from_results(results.clone(), 75);
        assert_eq!(report.score, 75);
        assert!(report.is_valid);

        let report = ValidationReport::from_results(results, 76);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_feedback_bands() {
        assert!(feedback(100, &[]).join(" ").contains("Perfect"));
        assert!(feedback(80, &[]).join(" ").contains("Most test cases passed"));
        assert!(feedback(50, &[]).join(" ").contains("some cases"));
        assert!(feedback(49, &[]).join(" ").contains("significant"));
    }

    #[test]
    fn test_feedback_lists_failed_visible_cases() {
        let results = vec![
            case(TestFixture::new("[2,1]", "[1,2]"), false, "[2,1]"),
            case(TestFixture::new("[1]", "[1]"), true, "[1]"),
            TestCaseResult {
                error: Some("execution timed out".to_string()),
                ..case(TestFixture::new("[3,2]", "[2,3]"), false, "")
            },
        ];

        let lines = feedback(33, &results);
        assert!(lines.contains(&"Test 1: expected [1,2], got [2,1]".to_string()));
        assert!(lines.contains(&"Test 3: expected [2,3], got error: execution timed out".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("Test 2")));
    }

    #[test]
    fn test_hidden_failures_never_leak() {
        let results = vec![
            case(TestFixture::new("[5,4]", "[4,5]"), true, "[4,5]"),
            case(TestFixture::hidden("[9,8,7]", "[7,8,9]"), false, "[9,8,7]"),
            case(TestFixture::hidden("[6,6]", "[6,6,6]"), false, "[6]"),
        ];

        let report = ValidationReport::from_results(results, 70);
        let text = report.feedback.join("\n");

        assert!(!text.contains("[7,8,9]"));
        assert!(!text.contains("[9,8,7]"));
        assert!(!text.contains("[6,6,6]"));
        assert!(text.contains("2 hidden test cases failed."));
        assert_eq!(report.passed_count, 1);
        assert_eq!(report.score, 33);
    }

    #[test]
    fn test_redacted_report_hides_hidden_cases() {
        let results = vec![
            case(TestFixture::new("[5,4]", "[4,5]"), true, "[4,5]"),
            case(TestFixture::hidden("[9,8,7]", "[7,8,9]"), false, "[9,8,7]"),
        ];
        let report = ValidationReport::from_results(results, 70).redacted();

        assert_eq!(report.per_case_results[0].fixture.expected_output, "[4,5]");
        assert_eq!(report.per_case_results[1].fixture.expected_output, "");
        assert_eq!(report.per_case_results[1].actual_output, "");
        assert_eq!(report.score, 50);
    }
}
