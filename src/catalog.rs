// src/catalog.rs

//! Algorithm fixture catalog.
//!
//! Maps an algorithm id to the fixtures a submission is graded against.
//! The built-in catalog is compiled into the binary; a YAML file with the
//! same shape can replace it via `catalog:` in `algograde.yaml`.
//!
//! ```yaml
//! algorithms:
//!   - id: 1
//!     name: Bubble Sort
//!     fixtures:
//!       - { input: "[2, 1]", expected: "[1,2]" }
//!       - { input: "[3, 3]", expected: "[3,3]", hidden: true }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::engine::fixture::parse_fixtures;
use crate::engine::{RawFixture, TestFixture};
use crate::error::GradeError;
use crate::util::{read_to_string, resolve_relative_to_config};

const BUILTIN_CATALOG: &str = include_str!("../catalog/algorithms.yaml");

/// Where graded fixtures come from.
pub trait FixtureSource: Send + Sync {
    fn fixtures_for(&self, algorithm_id: u32) -> Result<Vec<TestFixture>, GradeError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Algorithm {
    pub id: u32,
    pub name: String,
    pub fixtures: Vec<TestFixture>,
}

impl Algorithm {
    pub fn visible_fixtures(&self) -> impl Iterator<Item = &TestFixture> {
        self.fixtures.iter().filter(|f| !f.hidden)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    algorithms: Vec<RawAlgorithm>,
}

#[derive(Debug, Deserialize)]
struct RawAlgorithm {
    id: u32,
    name: String,
    #[serde(default)]
    fixtures: Vec<RawFixture>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    algorithms: BTreeMap<u32, Algorithm>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, GradeError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog. Duplicate ids and malformed fixtures
    /// reject the whole catalog.
    pub fn from_yaml(text: &str) -> Result<Self, GradeError> {
        let file: CatalogFile =
            serde_yaml::from_str(text).map_err(|e| GradeError::Catalog(e.to_string()))?;

        let mut algorithms = BTreeMap::new();
        for raw in file.algorithms {
            let fixtures = parse_fixtures(raw.fixtures)
                .map_err(|e| GradeError::Catalog(format!("algorithm {}: {}", raw.id, e)))?;

            let algorithm = Algorithm {
                id: raw.id,
                name: raw.name,
                fixtures,
            };
            if algorithms.insert(algorithm.id, algorithm).is_some() {
                return Err(GradeError::Catalog(format!("duplicate algorithm id {}", raw.id)));
            }
        }

        Ok(Self { algorithms })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = read_to_string(path)?;
        Self::from_yaml(&text).with_context(|| format!("Invalid catalog {:?}", path))
    }

    /// The catalog named in the config (relative to the config file), or
    /// the built-in one.
    pub fn from_config(cfg: &Config, config_path: &Path) -> Result<Self> {
        match &cfg.catalog {
            Some(rel) => {
                let path = resolve_relative_to_config(config_path, rel);
                Self::load(&path)
            }
            None => Ok(Self::builtin()?),
        }
    }

    pub fn get(&self, id: u32) -> Option<&Algorithm> {
        self.algorithms.get(&id)
    }

    pub fn algorithms(&self) -> impl Iterator<Item = &Algorithm> {
        self.algorithms.values()
    }
}

impl FixtureSource for Catalog {
    fn fixtures_for(&self, algorithm_id: u32) -> Result<Vec<TestFixture>, GradeError> {
        self.get(algorithm_id)
            .map(|a| a.fixtures.clone())
            .ok_or(GradeError::UnknownAlgorithm(algorithm_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, Grader};
    use crate::runners::{RawRunResult, RunnerRegistry, ScriptedRunner};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        let names: Vec<&str> = catalog.algorithms().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Bubble Sort", "Quick Sort", "Merge Sort", "Binary Search"]);

        let bubble = catalog.get(1).unwrap();
        assert_eq!(bubble.fixtures.len(), 5);
        assert_eq!(bubble.visible_fixtures().count(), 4);
        assert_eq!(bubble.fixtures[0].expected_output, "[11,12,22,25,34,64,90]");

        let search = catalog.fixtures_for(4).unwrap();
        assert_eq!(search[3].expected_output, "-1");
        assert!(search[5].hidden);
    }

    #[test]
    fn test_unknown_algorithm() {
        let catalog = Catalog::builtin().unwrap();
        assert!(matches!(
            catalog.fixtures_for(99),
            Err(GradeError::UnknownAlgorithm(99))
        ));
    }

    #[test]
    fn test_malformed_catalog_fixture_is_rejected() {
        let yaml = "algorithms:\n  - id: 7\n    name: Broken\n    fixtures:\n      - { input: \"[1]\" }\n";
        let err = Catalog::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("algorithm 7"));
        assert!(err.to_string().contains("expectedOutput"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let yaml = "algorithms:\n  - { id: 1, name: A }\n  - { id: 1, name: B }\n";
        assert!(matches!(Catalog::from_yaml(yaml), Err(GradeError::Catalog(_))));
    }

    #[test]
    fn test_config_catalog_path_is_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("mine.yaml"),
            "algorithms:\n  - id: 42\n    name: Reverse\n    fixtures:\n      - { input: \"abc\", expected: \"cba\" }\n",
        )
        .unwrap();

        let cfg = Config {
            catalog: Some("mine.yaml".to_string()),
            ..Config::default()
        };
        let catalog = Catalog::from_config(&cfg, &dir.path().join("algograde.yaml")).unwrap();
        assert_eq!(catalog.get(42).unwrap().name, "Reverse");
        assert!(catalog.get(1).is_none());
    }

    fn sorting_grader() -> Grader {
        let runner = ScriptedRunner::new("javascript", |_, input| {
            let mut values: Vec<i64> = serde_json::from_str(input.unwrap_or("[]")).unwrap();
            values.sort();
            RawRunResult::completed(
                format!("Result: {}\n", serde_json::to_string(&values).unwrap()),
                "",
                0,
            )
        });
        let registry = RunnerRegistry::new().with(Arc::new(runner));
        Grader::new(Engine::new(Arc::new(registry), Duration::from_millis(2000)))
    }

    #[tokio::test]
    async fn test_correct_sort_is_valid_for_every_sorting_algorithm() {
        let catalog = Catalog::builtin().unwrap();
        let grader = sorting_grader();

        for id in 1..=3 {
            let report = grader
                .validate_algorithm(id, "function solve(a) {}", "javascript", &catalog)
                .await
                .unwrap();
            assert_eq!(report.score, 100, "algorithm {}", id);
            assert!(report.is_valid);
        }
    }

    #[tokio::test]
    async fn test_validate_unknown_algorithm_fails() {
        let catalog = Catalog::builtin().unwrap();
        let err = sorting_grader()
            .validate_algorithm(1234, "", "javascript", &catalog)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_ALGORITHM");
    }
}
