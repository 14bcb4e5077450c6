//! Per-file conversion: source → artifact.
//!
//! For each [`SourceFile`] the [`FileConverter`] runs:
//!
//! 1. the collection's [`ContentConverter`] (raw record),
//! 2. the optional pre-validation hook (may add or repair fields),
//! 3. the [`ContentValidator`] (all-or-nothing),
//! 4. the optional post-conversion hook, or pretty-printed JSON.
//!
//! The result is an [`OutputFile`] named `<base>.json` in
//! `{base_dir}/{module_name}`. A failure at any step fails the file, and the
//! error names the source it came from.

use crate::config::{AppConfig, Hooks};
use crate::converter::{ContentConverter, ConvertError};
use crate::error::PipelineError;
use crate::types::{OutputFile, SourceFile};
use crate::validator::ContentValidator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub trait FileConverter: Send + Sync {
    fn convert(&self, file: &SourceFile) -> Result<OutputFile, PipelineError>;
}

/// Converter → hooks → validator → serializer.
#[derive(Clone)]
pub struct DefaultFileConverter {
    converter: Arc<dyn ContentConverter>,
    validator: Arc<dyn ContentValidator>,
    hooks: Hooks,
    output_dir: PathBuf,
}

impl DefaultFileConverter {
    pub fn new(
        config: &AppConfig,
        converter: Arc<dyn ContentConverter>,
        validator: Arc<dyn ContentValidator>,
    ) -> Self {
        Self {
            converter,
            validator,
            hooks: config.hooks.clone(),
            output_dir: config.output.module_dir(),
        }
    }
}

impl FileConverter for DefaultFileConverter {
    fn convert(&self, file: &SourceFile) -> Result<OutputFile, PipelineError> {
        let name = file.display_name();

        let mut record = self.converter.convert(file).map_err(|err| match err {
            ConvertError::Read(source) => PipelineError::Load {
                path: file.path(),
                message: source.to_string(),
            },
            other => PipelineError::Conversion {
                file: name.clone(),
                message: other.to_string(),
            },
        })?;

        if let Some(hook) = &self.hooks.pre_validation {
            record = hook(record, file).map_err(|err| PipelineError::Conversion {
                file: name.clone(),
                message: format!("pre-validation hook failed: {err}"),
            })?;
        }

        let record = self
            .validator
            .validate(record)
            .map_err(|source| PipelineError::Validation {
                file: name.clone(),
                source,
            })?;

        let text = match &self.hooks.post_conversion {
            Some(hook) => hook(&record).map_err(|err| PipelineError::Conversion {
                file: name.clone(),
                message: format!("post-conversion hook failed: {err}"),
            })?,
            None => serde_json::to_string_pretty(&record).map_err(|err| {
                PipelineError::Conversion {
                    file: name.clone(),
                    message: err.to_string(),
                }
            })?,
        };

        debug!(file = %name, "converted");
        Ok(OutputFile {
            file_name: file.artifact_name(),
            directory: self.output_dir.clone(),
            text,
        })
    }
}
