// src/util.rs

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Resolve a path relative to the directory holding a config or suite file.
///
/// Absolute paths are returned unchanged.
///
/// Example:
/// config at `/project/algograde.yaml`, catalog = "catalog.yaml"
/// → resolves to `/project/catalog.yaml`
pub fn resolve_relative_to_config(config_path: &Path, rel: &str) -> PathBuf {
    let rel = Path::new(rel);
    if rel.is_absolute() {
        return rel.to_path_buf();
    }

    match config_path.parent() {
        Some(base) => base.join(rel),
        None => rel.to_path_buf(),
    }
}

/// Read a UTF-8 file into a String with a clear error message.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Ensure a directory exists (create it if missing).
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("Failed to create directory {:?}", path))
}

/// Hex SHA-256 of a submission, used to identify it in CI summaries.
pub fn source_digest(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        let p = resolve_relative_to_config(Path::new("/project/algograde.yaml"), "cat.yaml");
        assert_eq!(p, PathBuf::from("/project/cat.yaml"));

        let p = resolve_relative_to_config(Path::new("/project/algograde.yaml"), "/etc/cat.yaml");
        assert_eq!(p, PathBuf::from("/etc/cat.yaml"));
    }

    #[test]
    fn test_source_digest_is_stable() {
        assert_eq!(
            source_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(source_digest("abc"), source_digest("abc"));
    }
}
