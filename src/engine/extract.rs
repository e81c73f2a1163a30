// src/engine/extract.rs

//! Canonical result extraction.
//!
//! Programs may print any diagnostics they like. The value that gets graded
//! is the first line starting with the result marker (`Result:` by default).
//! Programs that print nothing but the answer need no marker: without one,
//! the whole trimmed output is the result.

pub const DEFAULT_RESULT_MARKER: &str = "Result:";

/// Extract the comparison-ready value from raw program output using the
/// default marker.
pub fn extract_canonical_result(raw_output: &str) -> String {
    extract_with_marker(raw_output, DEFAULT_RESULT_MARKER)
}

pub fn extract_with_marker(raw_output: &str, marker: &str) -> String {
    if !marker.is_empty() {
        for line in raw_output.lines() {
            if let Some(rest) = line.trim_start().strip_prefix(marker) {
                return rest.trim().to_string();
            }
        }
    }

    raw_output.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_line_wins_over_noise() {
        let raw = "sorting...\nswapped 3 times\nResult: [1,2,3]\ndone\n";
        assert_eq!(extract_canonical_result(raw), "[1,2,3]");
    }

    #[test]
    fn test_first_marker_line_is_used() {
        let raw = "Result: 1\nResult: 2\n";
        assert_eq!(extract_canonical_result(raw), "1");
    }

    #[test]
    fn test_marker_allows_leading_whitespace() {
        assert_eq!(extract_canonical_result("   Result:   42  \n"), "42");
    }

    #[test]
    fn test_marker_must_prefix_the_line() {
        let raw = "Bubble sort Result: [1]\n";
        assert_eq!(extract_canonical_result(raw), "Bubble sort Result: [1]");
    }

    #[test]
    fn test_no_marker_returns_trimmed_output() {
        assert_eq!(extract_canonical_result("\n  [1,2]  \n"), "[1,2]");
        assert_eq!(extract_canonical_result(""), "");
    }

    #[test]
    fn test_crlf_output() {
        assert_eq!(extract_canonical_result("log\r\nResult: 7\r\n"), "7");
    }

    #[test]
    fn test_custom_marker() {
        assert_eq!(extract_with_marker("ANSWER=5\n", "ANSWER="), "5");
        assert_eq!(extract_with_marker(" 5 ", ""), "5");
    }
}
