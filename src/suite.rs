// src/suite.rs

//! Local test suites (`*.suite.yaml`).
//!
//! A suite pairs a solution file with fixtures so a submission can be
//! graded without the catalog:
//!
//! ```yaml
//! solution: solution.py       # relative to the suite file
//! language: python            # optional, inferred from the extension
//! threshold: 80               # optional, config value otherwise
//! fixtures:
//!   - { input: "[2, 1]", expected: "[1,2]" }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::fixture::parse_fixtures;
use crate::engine::{RawFixture, TestFixture};
use crate::language::LanguageId;
use crate::util::{read_to_string, resolve_relative_to_config};

pub const SUITE_SUFFIX: &str = ".suite.yaml";

#[derive(Debug, Deserialize)]
struct SuiteFile {
    #[serde(default)]
    solution: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    threshold: Option<u8>,
    #[serde(default)]
    fixtures: Vec<RawFixture>,
}

#[derive(Debug, Clone)]
pub struct Suite {
    pub path: PathBuf,
    pub solution: Option<PathBuf>,
    pub language: Option<LanguageId>,
    pub threshold: Option<u8>,
    pub fixtures: Vec<TestFixture>,
}

impl Suite {
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_to_string(path)?;
        let file: SuiteFile = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse suite {:?}", path))?;

        let fixtures =
            parse_fixtures(file.fixtures).with_context(|| format!("Invalid suite {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
            solution: file
                .solution
                .map(|s| resolve_relative_to_config(path, &s)),
            language: file.language.as_deref().map(LanguageId::new),
            threshold: file.threshold,
            fixtures,
        })
    }

    /// Language of `solution`: the suite's explicit setting, else the file
    /// extension.
    pub fn language_for(&self, solution: &Path) -> Option<LanguageId> {
        self.language
            .clone()
            .or_else(|| LanguageId::from_path(solution))
    }
}

/// Every `*.suite.yaml` under `root`, sorted for stable CI output.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let mut suites = Vec::new();

    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_suite = entry
            .file_name()
            .to_str()
            .map(|n| n.ends_with(SUITE_SUFFIX))
            .unwrap_or(false);
        if is_suite {
            suites.push(entry.path().to_path_buf());
        }
    }

    suites.sort();
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_solution_next_to_suite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sort.suite.yaml");
        std::fs::write(
            &path,
            "solution: sort.py\nthreshold: 80\nfixtures:\n  - { input: \"[2, 1]\", expected: \"[1,2]\" }\n  - { input: \"[]\", expected: \"[]\", hidden: true }\n",
        )
        .unwrap();

        let suite = Suite::load(&path).unwrap();
        let solution = suite.solution.clone().unwrap();
        assert_eq!(solution, dir.path().join("sort.py"));
        assert_eq!(suite.threshold, Some(80));
        assert_eq!(suite.fixtures.len(), 2);
        assert!(suite.fixtures[1].hidden);
        assert_eq!(suite.language_for(&solution).unwrap().as_str(), "python");
    }

    #[test]
    fn test_explicit_language_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.suite.yaml");
        std::fs::write(&path, "language: js\nfixtures: []\n").unwrap();

        let suite = Suite::load(&path).unwrap();
        let lang = suite.language_for(Path::new("main.txt")).unwrap();
        assert_eq!(lang.as_str(), "javascript");
    }

    #[test]
    fn test_malformed_fixture_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.suite.yaml");
        std::fs::write(&path, "fixtures:\n  - { expected: \"1\" }\n").unwrap();

        let err = Suite::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("missing `input`"));
    }

    #[test]
    fn test_discover_finds_nested_suites_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        std::fs::write(dir.path().join("b/nested/z.suite.yaml"), "fixtures: []").unwrap();
        std::fs::write(dir.path().join("a.suite.yaml"), "fixtures: []").unwrap();
        std::fs::write(dir.path().join("notes.yaml"), "x: 1").unwrap();

        let found = discover(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("a.suite.yaml"),
                dir.path().join("b/nested/z.suite.yaml"),
            ]
        );
    }
}
