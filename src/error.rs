//! The error every pipeline stage reports.
//!
//! Stage-specific errors ([`crate::converter::ConvertError`],
//! [`crate::schema::DecodeError`], I/O) are folded into one [`PipelineError`]
//! together with the file they concern, so a failed run always says which
//! document or path to look at.

use crate::config::ConfigError;
use crate::schema::DecodeError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Enumerating sources or reading one of them failed.
    #[error("Failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },
    /// The content converter or a user hook rejected a document.
    #[error("Failed to convert {file}: {message}")]
    Conversion { file: String, message: String },
    /// A converted record does not match the collection schema.
    #[error("{file} failed validation: {source}")]
    Validation {
        file: String,
        #[source]
        source: DecodeError,
    },
    /// Persisting an artifact or a generated module failed.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Stable name of the error kind, used as a prefix in reports.
    pub fn tag(&self) -> &'static str {
        match self {
            PipelineError::Load { .. } => "LoadError",
            PipelineError::Conversion { .. } => "ConversionError",
            PipelineError::Validation { .. } => "ValidationError",
            PipelineError::Write { .. } => "WriteError",
            PipelineError::Config(_) => "ConfigError",
        }
    }

    /// The source document or output path this error is about, if any.
    pub fn location(&self) -> Option<String> {
        match self {
            PipelineError::Load { path, .. } | PipelineError::Write { path, .. } => {
                Some(path.display().to_string())
            }
            PipelineError::Conversion { file, .. } | PipelineError::Validation { file, .. } => {
                Some(file.clone())
            }
            PipelineError::Config(_) => None,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Write {
            path: path.into(),
            source,
        }
    }
}
