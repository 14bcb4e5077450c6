//! Shared test utilities for the collectgen test suite.
//!
//! Provides a mutable copy of `fixtures/` and shortcuts for resolving the
//! fixture collections and reading what a build produced.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let configs = fixture_configs(tmp.path());
//! build_project(&configs, Some("Post"), None).unwrap();
//!
//! let hello = read_artifact(tmp.path(), "posts/hello.json");
//! assert_eq!(hello["title"], "Hello");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::config::{AppConfig, PROJECT_FILE, load_project};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Resolve every collection of the fixture project at `root`.
pub fn fixture_configs(root: &Path) -> Vec<AppConfig> {
    load_project(&root.join(PROJECT_FILE))
        .unwrap()
        .app_configs()
        .unwrap()
}

/// Write a source document under `root/content/{rel}`, creating directories.
pub fn write_source(root: &Path, rel: &str, text: &str) {
    let path = root.join("content").join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

// =========================================================================
// Build output lookups, panicking with a clear message on miss
// =========================================================================

/// Read a generated text file under `root/generated/{rel}`.
pub fn read_generated(root: &Path, rel: &str) -> String {
    let path = root.join("generated").join(rel);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

/// Parse a generated JSON artifact under `root/generated/{rel}`.
pub fn read_artifact(root: &Path, rel: &str) -> serde_json::Value {
    let text = read_generated(root, rel);
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("{rel} is not JSON: {e}"))
}

/// Names of the files directly inside `root/generated/{rel}`, sorted.
pub fn generated_files(root: &Path, rel: &str) -> Vec<String> {
    let dir = root.join("generated").join(rel);
    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("cannot list {}: {e}", dir.display()))
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
