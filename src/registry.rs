//! Collection registry behind the shared modules.
//!
//! Every collection contributes one re-export to `{base_dir}/index.mjs` and
//! one type declaration to `{base_dir}/index.d.ts`. Appending to those files
//! would duplicate lines on every rebuild, so instead each collection records
//! itself in a small manifest and both files are regenerated from the whole
//! manifest every time.
//!
//! # Storage
//!
//! The manifest is `{base_dir}/collections.json`, keyed by module name:
//!
//! ```json
//! {
//!   "version": 1,
//!   "collections": {
//!     "posts": { "variableName": "allPosts", "typeName": "Post", "typeStr": "type Post = ..." }
//!   }
//! }
//! ```
//!
//! Entries are sorted by module name, so the generated files do not depend on
//! which collection built last.
//!
//! # Concurrency
//!
//! [`register`] performs the read-modify-write under a process-wide lock and
//! replaces each file atomically. Collections built concurrently in one process
//! therefore never lose each other's entries.

use crate::writer::{WriteOutcome, replace_file};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Name of the registry manifest within the base directory.
pub const REGISTRY_FILENAME: &str = "collections.json";
/// Shared re-export module.
pub const PARENT_MODULE: &str = "index.mjs";
/// Shared type declarations.
pub const DECLARATIONS: &str = "index.d.ts";

/// Version of the registry format. Bump when the layout changes.
const REGISTRY_VERSION: u32 = 1;

static REGISTRY_LOCK: Mutex<()> = Mutex::new(());

/// What one collection contributes to the shared modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub variable_name: String,
    pub type_name: String,
    pub type_str: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub version: u32,
    /// Module name → entry.
    pub collections: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            version: REGISTRY_VERSION,
            collections: BTreeMap::new(),
        }
    }

    /// Load from the base directory. Returns an empty registry if the file
    /// doesn't exist or can't be used; collections re-register as they build.
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join(REGISTRY_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let registry: Self = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(err) => {
                warn!("ignoring unreadable {}: {err}", path.display());
                return Self::empty();
            }
        };
        if registry.version != REGISTRY_VERSION {
            warn!(
                "ignoring {} with version {} (expected {REGISTRY_VERSION})",
                path.display(),
                registry.version
            );
            return Self::empty();
        }
        registry
    }

    /// Save to the base directory.
    pub fn save(&self, base_dir: &Path) -> io::Result<WriteOutcome> {
        let json = serde_json::to_string_pretty(self)?;
        replace_file(&base_dir.join(REGISTRY_FILENAME), &json)
    }

    /// Add or replace the entry for `module_name`.
    ///
    /// Entries under other module names that export the same variable or
    /// declare the same type are dropped, so a renamed module leaves no
    /// duplicate binding behind.
    pub fn upsert(&mut self, module_name: &str, entry: RegistryEntry) {
        self.collections.retain(|module, existing| {
            let clashes = module != module_name
                && (existing.variable_name == entry.variable_name
                    || existing.type_name == entry.type_name);
            if clashes {
                warn!(
                    "replacing registry entry `{module}` ({}) with `{module_name}`",
                    existing.variable_name
                );
            }
            !clashes
        });
        self.collections.insert(module_name.to_string(), entry);
    }

    /// `export { allPosts } from './posts'`, one line per collection.
    pub fn parent_module(&self) -> String {
        self.collections
            .iter()
            .map(|(module, entry)| {
                format!("export {{ {} }} from './{module}'\n", entry.variable_name)
            })
            .collect()
    }

    /// Every collection's type declaration, separated by blank lines.
    pub fn declarations(&self) -> String {
        self.collections
            .values()
            .map(|entry| format!("{}\n", entry.type_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Record a collection and regenerate the shared modules.
///
/// Returns the paths of the regenerated files.
pub fn register(
    base_dir: &Path,
    module_name: &str,
    entry: RegistryEntry,
) -> io::Result<Vec<PathBuf>> {
    let _guard = REGISTRY_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let mut registry = Registry::load(base_dir);
    registry.upsert(module_name, entry);
    registry.save(base_dir)?;

    let parent = base_dir.join(PARENT_MODULE);
    let declarations = base_dir.join(DECLARATIONS);
    replace_file(&parent, &registry.parent_module())?;
    replace_file(&declarations, &registry.declarations())?;
    Ok(vec![parent, declarations])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry(variable: &str, type_name: &str) -> RegistryEntry {
        RegistryEntry {
            variable_name: variable.to_string(),
            type_name: type_name.to_string(),
            type_str: format!(
                "type {type_name} = {{ readonly body: string }}\nexport declare const {variable}: {type_name}[]"
            ),
        }
    }

    // =========================================================================
    // Registry basics
    // =========================================================================

    #[test]
    fn parent_module_lists_sorted_reexports() {
        let mut registry = Registry::empty();
        registry.upsert("posts", entry("allPosts", "Post"));
        registry.upsert("authors", entry("allAuthors", "Author"));

        assert_eq!(
            registry.parent_module(),
            "export { allAuthors } from './authors'\nexport { allPosts } from './posts'\n"
        );
    }

    #[test]
    fn declarations_include_every_type() {
        let mut registry = Registry::empty();
        registry.upsert("posts", entry("allPosts", "Post"));
        registry.upsert("authors", entry("allAuthors", "Author"));

        let text = registry.declarations();
        assert!(text.contains("type Author = "));
        assert!(text.contains("export declare const allPosts: Post[]\n"));
        assert!(text.find("type Author").unwrap() < text.find("type Post").unwrap());
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let mut registry = Registry::empty();
        registry.upsert("posts", entry("allPosts", "Post"));
        registry.upsert("posts", entry("allArticles", "Article"));

        assert_eq!(registry.collections.len(), 1);
        assert_eq!(registry.collections["posts"].variable_name, "allArticles");
    }

    #[test]
    fn upsert_drops_entry_left_by_a_renamed_module() {
        let mut registry = Registry::empty();
        registry.upsert("posts", entry("allPosts", "Post"));
        registry.upsert("authors", entry("allAuthors", "Author"));
        registry.upsert("blog", entry("allPosts", "Post"));

        assert_eq!(
            registry.collections.keys().collect::<Vec<_>>(),
            vec!["authors", "blog"]
        );
        assert_eq!(
            registry.parent_module(),
            "export { allAuthors } from './authors'\nexport { allPosts } from './blog'\n"
        );
    }

    #[test]
    fn upsert_drops_entry_declaring_the_same_type() {
        let mut registry = Registry::empty();
        registry.upsert("posts", entry("allPosts", "Post"));
        registry.upsert("articles", entry("allArticles", "Post"));

        assert_eq!(registry.collections.len(), 1);
        assert_eq!(registry.declarations().matches("type Post =").count(), 1);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut registry = Registry::empty();
        registry.upsert("posts", entry("allPosts", "Post"));
        registry.save(tmp.path()).unwrap();

        assert_eq!(Registry::load(tmp.path()), registry);
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(Registry::load(tmp.path()).collections.is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(REGISTRY_FILENAME), "not json").unwrap();
        assert!(Registry::load(tmp.path()).collections.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(REGISTRY_FILENAME),
            r#"{"version": 999, "collections": {"posts": {"variableName": "allPosts", "typeName": "Post", "typeStr": ""}}}"#,
        )
        .unwrap();
        assert!(Registry::load(tmp.path()).collections.is_empty());
    }

    // =========================================================================
    // register
    // =========================================================================

    #[test]
    fn register_twice_does_not_duplicate() {
        let tmp = TempDir::new().unwrap();
        register(tmp.path(), "posts", entry("allPosts", "Post")).unwrap();
        register(tmp.path(), "posts", entry("allPosts", "Post")).unwrap();

        let parent = fs::read_to_string(tmp.path().join(PARENT_MODULE)).unwrap();
        let dts = fs::read_to_string(tmp.path().join(DECLARATIONS)).unwrap();
        assert_eq!(parent.matches("allPosts").count(), 1);
        assert_eq!(dts.matches("type Post =").count(), 1);
    }

    #[test]
    fn register_after_module_rename_does_not_duplicate() {
        let tmp = TempDir::new().unwrap();
        register(tmp.path(), "posts", entry("allPosts", "Post")).unwrap();
        register(tmp.path(), "blog", entry("allPosts", "Post")).unwrap();

        let parent = fs::read_to_string(tmp.path().join(PARENT_MODULE)).unwrap();
        let dts = fs::read_to_string(tmp.path().join(DECLARATIONS)).unwrap();
        assert_eq!(parent, "export { allPosts } from './blog'\n");
        assert_eq!(dts.matches("type Post =").count(), 1);
    }

    #[test]
    fn register_keeps_other_collections() {
        let tmp = TempDir::new().unwrap();
        register(tmp.path(), "posts", entry("allPosts", "Post")).unwrap();
        register(tmp.path(), "authors", entry("allAuthors", "Author")).unwrap();

        let parent = fs::read_to_string(tmp.path().join(PARENT_MODULE)).unwrap();
        assert!(parent.contains("export { allPosts } from './posts'"));
        assert!(parent.contains("export { allAuthors } from './authors'"));
    }

    #[test]
    fn concurrent_registration_keeps_every_entry() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let base = &base;
                scope.spawn(move || {
                    let name = format!("things{i}");
                    let variable = format!("allThings{i}");
                    register(base, &name, entry(&variable, &format!("Thing{i}"))).unwrap();
                });
            }
        });

        let registry = Registry::load(&base);
        assert_eq!(registry.collections.len(), 8);
        let parent = fs::read_to_string(base.join(PARENT_MODULE)).unwrap();
        assert_eq!(parent.lines().count(), 8);
    }
}
