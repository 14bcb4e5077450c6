//! Source discovery.
//!
//! First stage of a collection run. Walks the collection directory and returns
//! one [`SourceFile`] per file matching an `include` glob and no `exclude`
//! glob. Text is not read here; see [`SourceFile::text`].
//!
//! ## Matching Rules
//!
//! - Patterns match the path relative to the collection directory, using `/`
//!   as separator (`*.md` matches `hello.md` but not `2024/recap.md`;
//!   `**/*.md` matches both).
//! - Hidden files and directories (leading `.`) are skipped.
//! - Results are sorted by relative path. Callers use the order for display
//!   and for the aggregator's array order, never for correctness.

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::types::SourceFile;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Produces the source files of a collection.
pub trait Loader: Send + Sync {
    fn load(&self, config: &AppConfig) -> Result<Vec<SourceFile>, PipelineError>;
}

/// Filesystem loader driven by the collection's include/exclude globs.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobLoader;

impl Loader for GlobLoader {
    fn load(&self, config: &AppConfig) -> Result<Vec<SourceFile>, PipelineError> {
        let root = &config.directory;
        if !root.is_dir() {
            return Err(PipelineError::Load {
                path: root.clone(),
                message: "collection directory does not exist".into(),
            });
        }

        let include = build_globset(root, &config.include)?;
        let exclude = build_globset(root, &config.exclude)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        for entry in walker {
            let entry = entry.map_err(|err| PipelineError::Load {
                path: err.path().unwrap_or(root.as_path()).to_path_buf(),
                message: err.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if include.is_match(relative) && !exclude.is_match(relative) {
                files.push(SourceFile::on_disk(root, relative));
            }
        }

        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        debug!(
            collection = %config.name,
            count = files.len(),
            "loaded sources from {}",
            root.display()
        );
        Ok(files)
    }
}

/// Serves a fixed list of sources. Useful for generated or in-memory content.
#[derive(Debug, Default, Clone)]
pub struct StaticLoader(pub Vec<SourceFile>);

impl Loader for StaticLoader {
    fn load(&self, _config: &AppConfig) -> Result<Vec<SourceFile>, PipelineError> {
        Ok(self.0.clone())
    }
}

fn build_globset(root: &Path, patterns: &[String]) -> Result<GlobSet, PipelineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|err| PipelineError::Load {
                path: root.to_path_buf(),
                message: format!("invalid glob pattern {pattern}: {err}"),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| PipelineError::Load {
        path: root.to_path_buf(),
        message: err.to_string(),
    })
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}
