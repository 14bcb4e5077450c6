//! Module generation for a collection.
//!
//! After every artifact of a collection has been written, the
//! [`ModuleResolver`] produces the code that ties them together:
//!
//! ```text
//! generated/
//! ├── collections.json        # Registry (see crate::registry)
//! ├── index.mjs               # export { allPosts } from './posts'
//! ├── index.d.ts              # type Post = {...}
//! │                           # export declare const allPosts: Post[]
//! └── posts/
//!     ├── index.mjs           # Aggregator
//!     ├── hello.json
//!     └── world.json
//! ```
//!
//! The aggregator imports each artifact as a JSON module and exports them as
//! one array:
//!
//! ```text
//! import hello from './hello.json' with { type: 'json' }
//! import world from './world.json' with { type: 'json' }
//!
//! export const allPosts = [hello, world]
//! ```
//!
//! Codegen runs only after the whole batch has been written, so a failed run
//! never leaves an aggregator pointing at artifacts that do not exist.

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::naming::identifier;
use crate::registry::{self, RegistryEntry};
use crate::types::SourceFile;
use crate::writer::replace_file;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the per-collection aggregator module.
pub const AGGREGATOR: &str = "index.mjs";

/// What codegen produced for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub aggregator: PathBuf,
    /// Import bindings, in source order.
    pub identifiers: Vec<String>,
    /// Shared modules regenerated from the registry.
    pub shared: Vec<PathBuf>,
    /// Artifacts removed because their source no longer exists.
    pub pruned: Vec<PathBuf>,
}

pub trait ModuleResolver: Send + Sync {
    /// Make sure the module directory exists. Runs before any artifact is written.
    fn prepare(&self, config: &AppConfig) -> Result<(), PipelineError>;

    /// Generate the aggregator and register the collection in the shared modules.
    fn resolve(
        &self,
        config: &AppConfig,
        files: &[SourceFile],
    ) -> Result<ResolvedModule, PipelineError>;
}

/// Filesystem resolver writing under the collection's `base_dir`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsModuleResolver;

impl ModuleResolver for FsModuleResolver {
    fn prepare(&self, config: &AppConfig) -> Result<(), PipelineError> {
        let module_dir = config.output.module_dir();
        fs::create_dir_all(&module_dir)
            .map_err(|source| PipelineError::write(&module_dir, source))
    }

    fn resolve(
        &self,
        config: &AppConfig,
        files: &[SourceFile],
    ) -> Result<ResolvedModule, PipelineError> {
        let output = &config.output;
        let module_dir = output.module_dir();

        let identifiers = identifiers(files, &output.variable_name);
        let aggregator = module_dir.join(AGGREGATOR);
        let source = aggregator_source(files, &identifiers, &output.variable_name);
        replace_file(&aggregator, &source)
            .map_err(|source| PipelineError::write(&aggregator, source))?;
        debug!(
            collection = %config.name,
            "wrote {} with {} imports",
            aggregator.display(),
            identifiers.len()
        );

        let entry = RegistryEntry {
            variable_name: output.variable_name.clone(),
            type_name: output.type_name.clone(),
            type_str: config.type_str().to_string(),
        };
        let shared = registry::register(&output.base_dir, &output.module_name, entry)
            .map_err(|source| PipelineError::write(&output.base_dir, source))?;

        let pruned = prune_stale(&module_dir, files)?;
        for path in &pruned {
            info!(collection = %config.name, "removed stale artifact {}", path.display());
        }

        Ok(ResolvedModule {
            aggregator,
            identifiers,
            shared,
            pruned,
        })
    }
}

/// Fail when two sources would write the same artifact.
pub fn check_conflicts(files: &[SourceFile]) -> Result<(), PipelineError> {
    let mut seen: HashMap<String, &SourceFile> = HashMap::new();
    for file in files {
        if let Some(first) = seen.insert(file.artifact_name(), file) {
            return Err(PipelineError::Load {
                path: file.path(),
                message: format!(
                    "{} and {} would both be written as {}",
                    first.display_name(),
                    file.display_name(),
                    file.artifact_name()
                ),
            });
        }
    }
    Ok(())
}

/// One unique binding per file, derived from its base name.
///
/// Colliding names (`hello-world.md`, `helloWorld.md`) get numeric suffixes
/// in source order: `helloWorld`, `helloWorld2`. `variable_name` is the
/// module's own export and is never handed out.
pub fn identifiers(files: &[SourceFile], variable_name: &str) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::from([variable_name.to_string()]);
    files
        .iter()
        .map(|file| {
            let base = identifier(&file.base_name());
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{base}{n}");
                n += 1;
            }
            if candidate != base {
                warn!(
                    "identifier `{base}` for {} is taken, using `{candidate}`",
                    file.display_name()
                );
            }
            candidate
        })
        .collect()
}

/// Source text of the aggregator module.
pub fn aggregator_source(
    files: &[SourceFile],
    identifiers: &[String],
    variable_name: &str,
) -> String {
    let mut out = String::new();
    for (file, ident) in files.iter().zip(identifiers) {
        out.push_str(&format!(
            "import {ident} from './{}' with {{ type: 'json' }}\n",
            file.artifact_name()
        ));
    }
    if !files.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!(
        "export const {variable_name} = [{}]\n",
        identifiers.join(", ")
    ));
    out
}

/// Remove `.json` files in `module_dir` that no source produces anymore.
fn prune_stale(module_dir: &Path, files: &[SourceFile]) -> Result<Vec<PathBuf>, PipelineError> {
    let expected: HashSet<String> = files.iter().map(SourceFile::artifact_name).collect();
    let entries =
        fs::read_dir(module_dir).map_err(|source| PipelineError::write(module_dir, source))?;

    let mut pruned = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_json = path.extension().is_some_and(|e| e == "json");
        let name = entry.file_name().to_string_lossy().to_string();
        if is_json && path.is_file() && !expected.contains(&name) {
            fs::remove_file(&path).map_err(|source| PipelineError::write(&path, source))?;
            pruned.push(path);
        }
    }
    pruned.sort();
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputOverrides, UserConfig};
    use crate::registry::{DECLARATIONS, PARENT_MODULE};
    use crate::schema::FieldType;
    use tempfile::TempDir;

    fn sources(names: &[&str]) -> Vec<SourceFile> {
        names
            .iter()
            .map(|n| SourceFile::inline("content/posts", *n, ""))
            .collect()
    }

    fn config(base: &Path, name: &str) -> AppConfig {
        AppConfig::resolve(
            UserConfig::new(name, "content")
                .include("*.md")
                .fields(|f| f.field("title", FieldType::String))
                .output(OutputOverrides {
                    base_dir: Some(base.to_path_buf()),
                    ..Default::default()
                }),
        )
        .unwrap()
    }

    // =========================================================================
    // Pure generation
    // =========================================================================

    #[test]
    fn aggregator_imports_each_artifact_and_exports_array() {
        let files = sources(&["hello.md", "world.md"]);
        let idents = identifiers(&files, "allPosts");
        let text = aggregator_source(&files, &idents, "allPosts");

        assert_eq!(
            text,
            "import hello from './hello.json' with { type: 'json' }\n\
             import world from './world.json' with { type: 'json' }\n\
             \n\
             export const allPosts = [hello, world]\n"
        );
    }

    #[test]
    fn empty_collection_exports_empty_array() {
        assert_eq!(
            aggregator_source(&[], &[], "allPosts"),
            "export const allPosts = []\n"
        );
    }

    #[test]
    fn identifiers_are_camel_case() {
        let files = sources(&["my-first-post.md", "2024/Year In Review.md"]);
        assert_eq!(identifiers(&files, "allPosts"), vec!["myFirstPost", "yearInReview"]);
    }

    #[test]
    fn identifiers_escape_invalid_names() {
        let files = sources(&["404.md", "default.md"]);
        assert_eq!(identifiers(&files, "allPosts"), vec!["_404", "_default"]);
    }

    #[test]
    fn colliding_identifiers_get_suffixes() {
        let files = sources(&["hello-world.md", "helloWorld.md", "hello_world.md"]);
        assert_eq!(
            identifiers(&files, "allPosts"),
            vec!["helloWorld", "helloWorld2", "helloWorld3"]
        );
    }

    #[test]
    fn identifiers_never_shadow_the_export() {
        let files = sources(&["all-posts.md", "public.md", "interface.md"]);
        let idents = identifiers(&files, "allPosts");
        assert_eq!(idents, vec!["allPosts2", "_public", "_interface"]);

        let text = aggregator_source(&files, &idents, "allPosts");
        assert!(text.contains("import allPosts2 from './all-posts.json'"));
        assert!(text.ends_with("export const allPosts = [allPosts2, _public, _interface]\n"));
        assert_eq!(text.matches("allPosts ").count(), 1);
    }

    #[test]
    fn conflicting_artifacts_rejected() {
        let files = sources(&["hello.md", "2024/hello.md"]);
        let err = check_conflicts(&files).unwrap_err();

        assert_eq!(err.tag(), "LoadError");
        assert!(err.to_string().contains("hello.json"));
        assert!(check_conflicts(&sources(&["a.md", "b.md"])).is_ok());
    }

    // =========================================================================
    // Filesystem resolver
    // =========================================================================

    #[test]
    fn prepare_creates_module_dir() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), "Post");
        FsModuleResolver.prepare(&config).unwrap();
        assert!(tmp.path().join("posts").is_dir());
    }

    #[test]
    fn resolve_writes_aggregator_and_shared_modules() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), "Post");
        FsModuleResolver.prepare(&config).unwrap();

        let module = FsModuleResolver
            .resolve(&config, &sources(&["hello.md", "world.md"]))
            .unwrap();

        assert_eq!(module.aggregator, tmp.path().join("posts/index.mjs"));
        assert_eq!(module.identifiers, vec!["hello", "world"]);
        let parent = fs::read_to_string(tmp.path().join(PARENT_MODULE)).unwrap();
        assert_eq!(parent, "export { allPosts } from './posts'\n");
        let dts = fs::read_to_string(tmp.path().join(DECLARATIONS)).unwrap();
        assert!(dts.starts_with("type Post = {"));
        assert!(dts.contains("export declare const allPosts: Post[]"));
    }

    #[test]
    fn resolve_prunes_stale_artifacts_only() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), "Post");
        FsModuleResolver.prepare(&config).unwrap();
        let module_dir = tmp.path().join("posts");
        fs::write(module_dir.join("hello.json"), "{}").unwrap();
        fs::write(module_dir.join("gone.json"), "{}").unwrap();
        fs::write(module_dir.join("notes.txt"), "keep").unwrap();

        let module = FsModuleResolver
            .resolve(&config, &sources(&["hello.md"]))
            .unwrap();

        assert_eq!(module.pruned, vec![module_dir.join("gone.json")]);
        assert!(module_dir.join("hello.json").exists());
        assert!(module_dir.join("notes.txt").exists());
        assert!(!module_dir.join("gone.json").exists());
    }

    #[test]
    fn resolve_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), "Post");
        let files = sources(&["hello.md", "world.md"]);
        FsModuleResolver.prepare(&config).unwrap();

        FsModuleResolver.resolve(&config, &files).unwrap();
        let first = fs::read_to_string(tmp.path().join("posts/index.mjs")).unwrap();
        FsModuleResolver.resolve(&config, &files).unwrap();
        let second = fs::read_to_string(tmp.path().join("posts/index.mjs")).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.matches("import hello ").count(), 1);
        let parent = fs::read_to_string(tmp.path().join(PARENT_MODULE)).unwrap();
        assert_eq!(parent.lines().count(), 1);
    }
}
