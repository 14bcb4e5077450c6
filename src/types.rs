//! Shared types passed between pipeline stages.
//!
//! A [`SourceFile`] enters the pipeline from the loader; an [`OutputFile`]
//! leaves it through the writer. Both have the same shape (a file name
//! relative to a directory), which keeps "where did this come from" and
//! "where does this go" symmetric in logs and reports.

use std::io;
use std::path::PathBuf;

/// A converted document: field name → JSON value.
///
/// Key order is preserved, so artifacts list fields in declaration order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Where a source file's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Text {
    /// Read from `directory/file_name` each time it is requested.
    Disk,
    /// Held in memory (tests, generated sources).
    Inline(String),
}

/// A matched source document.
///
/// The text is not read at construction; [`SourceFile::text`] reads it on
/// demand and may fail if the file has changed since it was matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to `directory`, e.g. `hello.md` or `2024/recap.md`.
    pub file_name: PathBuf,
    /// The collection's source directory.
    pub directory: PathBuf,
    text: Text,
}

impl SourceFile {
    /// A file whose text lives on disk at `directory/file_name`.
    pub fn on_disk(directory: impl Into<PathBuf>, file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            directory: directory.into(),
            text: Text::Disk,
        }
    }

    /// A file whose text is already in memory.
    pub fn inline(
        directory: impl Into<PathBuf>,
        file_name: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            directory: directory.into(),
            text: Text::Inline(text.into()),
        }
    }

    /// Full path of the source on disk.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Load the document text.
    pub fn text(&self) -> io::Result<String> {
        match &self.text {
            Text::Disk => std::fs::read_to_string(self.path()),
            Text::Inline(text) => Ok(text.clone()),
        }
    }

    /// File name without directories or extension: `2024/recap.md` → `recap`.
    pub fn base_name(&self) -> String {
        self.file_name
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Extension without the dot, or `unknown` when there is none.
    pub fn file_type(&self) -> String {
        self.file_name
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// `file_name` as a forward-slash string, stable across platforms.
    pub fn display_name(&self) -> String {
        self.file_name
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Name of the JSON artifact this source produces.
    pub fn artifact_name(&self) -> String {
        format!("{}.json", self.base_name())
    }
}

/// A file the pipeline is about to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Bare file name, e.g. `hello.json`.
    pub file_name: String,
    /// Target directory, `{base_dir}/{module_name}` for artifacts.
    pub directory: PathBuf,
    pub text: String,
}

impl OutputFile {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}
