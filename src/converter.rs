//! Content converters: source text → unvalidated record.
//!
//! The pipeline treats conversion as an opaque capability behind the
//! [`ContentConverter`] trait. Converters are looked up by the collection's
//! `format` in a [`ConverterRegistry`]; the registry built by
//! [`ConverterRegistry::standard`] always carries `markdown`.
//!
//! ## Markdown
//!
//! [`MarkdownConverter`] reads optional front matter and renders the rest:
//!
//! ```text
//! ---                      +++
//! title: Hello             title = "Hello"
//! tags: [a, b]             tags = ["a", "b"]
//! ---                      +++
//!
//! # Body in CommonMark (tables, footnotes, strikethrough, task lists)
//! ```
//!
//! The produced record holds every front matter key, then `_meta` (see
//! [`crate::metadata`]), then `body` with the rendered HTML. Raw HTML in the
//! document is escaped unless `allow_dangerous_html` is set.

use crate::metadata::OutputMeta;
use crate::schema::{BODY_FIELD, META_FIELD};
use crate::types::{Record, SourceFile};
use pulldown_cmark::{Event, Options, Parser, html as md_html};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The source text could not be read. Reported as a load failure.
    #[error("IO error: {0}")]
    Read(#[from] io::Error),
    #[error("Front matter error: {0}")]
    FrontMatter(String),
    #[error("{0}")]
    Failed(String),
}

/// Turns one source file into a record.
///
/// Implementations must be `Send + Sync`; files of a collection are converted
/// in parallel.
pub trait ContentConverter: Send + Sync {
    fn convert(&self, file: &SourceFile) -> Result<Record, ConvertError>;
}

/// Format name → converter.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn ContentConverter>>,
}

impl ConverterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in converters.
    pub fn standard(markdown: &MarkdownOptions) -> Self {
        let mut registry = Self::new();
        registry.register("markdown", MarkdownConverter::new(markdown.clone()));
        registry
    }

    /// Add or replace the converter for `format`.
    pub fn register(
        &mut self,
        format: impl Into<String>,
        converter: impl ContentConverter + 'static,
    ) {
        self.converters.insert(format.into(), Arc::new(converter));
    }

    pub fn get(&self, format: &str) -> Option<Arc<dyn ContentConverter>> {
        self.converters.get(format).cloned()
    }

    /// Registered format names, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.converters.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

// =============================================================================
// Markdown
// =============================================================================

/// `[collections.markdown]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownOptions {
    /// Pass raw HTML through instead of escaping it.
    pub allow_dangerous_html: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownConverter {
    options: MarkdownOptions,
}

impl MarkdownConverter {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    /// Render a markdown body to HTML.
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let allow_html = self.options.allow_dangerous_html;
        let parser = Parser::new_ext(markdown, options).map(move |event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) if !allow_html => Event::Text(raw),
            other => other,
        });

        let mut html = String::new();
        md_html::push_html(&mut html, parser);
        html
    }
}

impl ContentConverter for MarkdownConverter {
    fn convert(&self, file: &SourceFile) -> Result<Record, ConvertError> {
        let text = file.text()?;
        let (front, body) = split_front_matter(&text)?;

        let meta = OutputMeta::for_source(file)
            .to_value()
            .map_err(|e| ConvertError::Failed(format!("metadata: {e}")))?;
        let mut record = front;
        record.insert(META_FIELD.to_string(), meta);
        record.insert(BODY_FIELD.to_string(), Value::String(self.render(body)));
        Ok(record)
    }
}

/// Split `text` into its front matter (as a record) and the remaining body.
///
/// Front matter must open on the first line with `---` (YAML) or `+++`
/// (TOML) and close with the same fence on its own line. Text without an
/// opening fence is all body.
pub fn split_front_matter(text: &str) -> Result<(Record, &str), ConvertError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some((fence, rest)) = opening_fence(text) else {
        return Ok((Record::new(), text));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == fence {
            let raw = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let record = match fence {
                "---" => parse_yaml(raw)?,
                _ => parse_toml(raw)?,
            };
            return Ok((record, body));
        }
        offset += line.len();
    }

    Err(ConvertError::FrontMatter(format!(
        "missing closing `{fence}` fence"
    )))
}

fn opening_fence(text: &str) -> Option<(&'static str, &str)> {
    for fence in ["---", "+++"] {
        if let Some(rest) = text.strip_prefix(fence)
            && let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
        {
            return Some((fence, rest));
        }
    }
    None
}

fn parse_yaml(raw: &str) -> Result<Record, ConvertError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| ConvertError::FrontMatter(e.to_string()))?;
    match value {
        serde_yaml::Value::Null => Ok(Record::new()),
        serde_yaml::Value::Mapping(_) => {
            let json = serde_json::to_value(value)
                .map_err(|e| ConvertError::FrontMatter(e.to_string()))?;
            match json {
                Value::Object(map) => Ok(map),
                _ => Err(not_a_mapping()),
            }
        }
        _ => Err(not_a_mapping()),
    }
}

fn parse_toml(raw: &str) -> Result<Record, ConvertError> {
    let table: toml::Table =
        toml::from_str(raw).map_err(|e| ConvertError::FrontMatter(e.to_string()))?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect())
}

/// TOML datetimes become their RFC 3339 text; everything else maps directly.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

fn not_a_mapping() -> ConvertError {
    ConvertError::FrontMatter("front matter must be a mapping of keys to values".into())
}
