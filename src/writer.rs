//! Artifact persistence.
//!
//! The [`Writer`] stores one [`OutputFile`] at `{directory}/{file_name}`. It
//! does not create directories: the module directory is prepared by the
//! [`crate::codegen::ModuleResolver`] before any artifact is written, and a
//! missing directory is reported as a write error rather than papered over.
//!
//! Writes go through [`replace_file`]: identical content is left untouched
//! (so file watchers downstream see no change), and new content is written
//! to a temporary sibling then renamed into place, so readers never observe
//! a half-written file.

use crate::error::PipelineError;
use crate::types::OutputFile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What a write did to the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The file already had exactly this content.
    Unchanged,
}

pub trait Writer: Send + Sync {
    fn write(&self, file: &OutputFile) -> Result<WriteOutcome, PipelineError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriter;

impl Writer for FsWriter {
    fn write(&self, file: &OutputFile) -> Result<WriteOutcome, PipelineError> {
        let path = file.path();
        replace_file(&path, &file.text).map_err(|source| PipelineError::write(path, source))
    }
}

/// Replace `path` with `text` unless it already holds exactly that.
///
/// The parent directory must exist.
pub fn replace_file(path: &Path, text: &str) -> io::Result<WriteOutcome> {
    if let Ok(current) = fs::read(path)
        && current == text.as_bytes()
    {
        return Ok(WriteOutcome::Unchanged);
    }

    let tmp = temp_sibling(path);
    fs::write(&tmp, text)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(WriteOutcome::Written)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Mock writer that records files instead of touching the disk.
    #[derive(Default)]
    pub struct MockWriter {
        pub written: Mutex<Vec<OutputFile>>,
        pub failures: HashSet<String>,
    }

    impl MockWriter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail writes of the artifact named `file_name`.
        pub fn failing(mut self, file_name: &str) -> Self {
            self.failures.insert(file_name.to_string());
            self
        }

        /// Names of written artifacts, sorted.
        pub fn get_written(&self) -> Vec<String> {
            let mut names: Vec<String> = self
                .written
                .lock()
                .unwrap()
                .iter()
                .map(|f| f.file_name.clone())
                .collect();
            names.sort();
            names
        }
    }

    impl Writer for MockWriter {
        fn write(&self, file: &OutputFile) -> Result<WriteOutcome, PipelineError> {
            if self.failures.contains(&file.file_name) {
                return Err(PipelineError::write(
                    file.path(),
                    io::Error::other("mock write failure"),
                ));
            }
            self.written.lock().unwrap().push(file.clone());
            Ok(WriteOutcome::Written)
        }
    }

    fn output(dir: &Path, name: &str, text: &str) -> OutputFile {
        OutputFile {
            file_name: name.to_string(),
            directory: dir.to_path_buf(),
            text: text.to_string(),
        }
    }

    #[test]
    fn writes_to_directory_and_file_name() {
        let tmp = TempDir::new().unwrap();
        let outcome = FsWriter.write(&output(tmp.path(), "hello.json", "{}")).unwrap();

        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(fs::read_to_string(tmp.path().join("hello.json")).unwrap(), "{}");
    }

    #[test]
    fn identical_content_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let file = output(tmp.path(), "hello.json", "{}");

        FsWriter.write(&file).unwrap();
        assert_eq!(FsWriter.write(&file).unwrap(), WriteOutcome::Unchanged);

        let changed = output(tmp.path(), "hello.json", "{\"a\": 1}");
        assert_eq!(FsWriter.write(&changed).unwrap(), WriteOutcome::Written);
        assert_eq!(
            fs::read_to_string(tmp.path().join("hello.json")).unwrap(),
            "{\"a\": 1}"
        );
    }

    #[test]
    fn missing_directory_is_write_error() {
        let tmp = TempDir::new().unwrap();
        let err = FsWriter
            .write(&output(&tmp.path().join("absent"), "hello.json", "{}"))
            .unwrap_err();

        assert_eq!(err.tag(), "WriteError");
        assert!(!tmp.path().join("absent").exists());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        FsWriter.write(&output(tmp.path(), "a.json", "1")).unwrap();
        FsWriter.write(&output(tmp.path(), "a.json", "2")).unwrap();

        let names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json"]);
    }
}
