// src/language.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Normalised language identifier.
///
/// Identifiers are lowercase and aliases are folded onto one canonical
/// name, so `"C++"`, `"cpp"` and `"cxx"` all resolve to the same runner.
/// The registry is keyed by this value, which keeps the set of languages
/// open: registering a runner under a new id needs no change here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(String);

pub const JAVASCRIPT: &str = "javascript";
pub const PYTHON: &str = "python";
pub const JAVA: &str = "java";
pub const CPP: &str = "cpp";

impl LanguageId {
    pub fn new(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        let canonical = match lower.as_str() {
            "js" | "node" | "nodejs" => JAVASCRIPT,
            "py" | "python3" => PYTHON,
            "c++" | "cxx" | "cc" => CPP,
            other => other,
        };
        Self(canonical.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Guess the language from a source file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        let id = match ext.as_str() {
            "js" | "mjs" | "cjs" => JAVASCRIPT,
            "py" => PYTHON,
            "java" => JAVA,
            "cpp" | "cc" | "cxx" => CPP,
            _ => return None,
        };
        Some(Self(id.to_string()))
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_fold_to_canonical() {
        assert_eq!(LanguageId::new("C++").as_str(), "cpp");
        assert_eq!(LanguageId::new(" JavaScript ").as_str(), "javascript");
        assert_eq!(LanguageId::new("js").as_str(), "javascript");
        assert_eq!(LanguageId::new("py").as_str(), "python");
        assert_eq!(LanguageId::new("Java").as_str(), "java");
    }

    #[test]
    fn test_unknown_ids_pass_through_lowercased() {
        assert_eq!(LanguageId::new("COBOL").as_str(), "cobol");
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            LanguageId::from_path(Path::new("solutions/sort.py")),
            Some(LanguageId::new("python"))
        );
        assert_eq!(
            LanguageId::from_path(Path::new("Main.java")),
            Some(LanguageId::new("java"))
        );
        assert_eq!(LanguageId::from_path(Path::new("notes.txt")), None);
    }
}
