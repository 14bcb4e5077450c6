//! Provenance metadata attached to every record.
//!
//! Converters call [`OutputMeta::for_source`] and store the result under the
//! reserved `_meta` key. The schema checks its shape like any other field
//! (see [`crate::schema::meta_fields`]), so downstream code can rely on it.
//!
//! | Key | `posts/Test File.md` |
//! |---|---|
//! | `sourceFileName` | `Test File.md` |
//! | `sourceDirectory` | `posts` |
//! | `sourceFileType` | `md` |
//! | `slug` | `test-file` |

use crate::naming::slugify;
use crate::types::SourceFile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMeta {
    /// Source path relative to the collection directory.
    pub source_file_name: String,
    pub source_directory: String,
    /// Extension without the dot, `unknown` when absent.
    pub source_file_type: String,
    /// Slug of the base file name.
    pub slug: String,
}

impl OutputMeta {
    pub fn for_source(file: &SourceFile) -> Self {
        Self {
            source_file_name: file.display_name(),
            source_directory: file.directory.to_string_lossy().to_string(),
            source_file_type: file.file_type(),
            slug: slugify(&file.base_name()),
        }
    }

    /// The `_meta` value stored on a record.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
