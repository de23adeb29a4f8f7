//! Architectural Enforcement
//!
//! Source scanners shared by the enforcement tests under `tests/`.
//! The rules they check:
//! - Production code does all file, network and terminal I/O through tokio
//! - Blocking calls are allowed only in non-async functions and tests

use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["router/core/src", "router/cli/src"];

/// The workspace root this crate lives in
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under `dir`, in walk order
///
/// A missing directory yields no files.
#[must_use]
pub fn rust_sources(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_dirs_exist() {
        let root = workspace_root();
        for dir in PRODUCTION_DIRS {
            assert!(root.join(dir).is_dir(), "missing {dir}");
        }
    }

    #[test]
    fn test_rust_sources_finds_lib() {
        let files = rust_sources(&workspace_root().join("router/core/src"));
        assert!(files.iter().any(|p| p.ends_with("lib.rs")));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        assert!(rust_sources(Path::new("does/not/exist")).is_empty());
    }
}
