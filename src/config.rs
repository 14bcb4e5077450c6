//! Collection configuration.
//!
//! Two layers live here:
//!
//! - **Resolution** ([`UserConfig`] → [`AppConfig`]): a collection declared in
//!   code or in the project file is turned into an immutable, fully-resolved
//!   configuration: normalized names, output locations, the compiled schema,
//!   its `decode` function and the derived type declaration.
//! - **Project file** ([`ProjectConfig`]): `collectgen.toml`, merged on top of
//!   stock defaults, with unknown keys rejected.
//!
//! ## Project File
//!
//! ```toml
//! base_dir = "generated"         # Shared output root (relative to this file)
//!
//! [processing]
//! max_threads = 4                # Omit for auto = CPU cores
//!
//! [[collections]]
//! name = "Post"                  # Drives type/module/variable names
//! directory = "content/posts"    # Relative to this file
//! include = "**/*.md"            # String or array of globs
//! exclude = ["drafts/**"]
//! format = "markdown"
//! strictness = "ignore"          # ignore | error | preserve
//!
//! [collections.fields]
//! title = "string"
//! date = "string?"
//! tags = "string[]"
//!
//! [collections.output]
//! module_name = "blog"           # Any of base_dir, type_name, module_name, variable_name
//! ```
//!
//! Relative paths resolve against the directory holding the project file, so
//! a build behaves the same from any working directory.

use crate::converter::MarkdownOptions;
use crate::naming::{is_identifier, normalize};
use crate::schema::{
    DecodeError, FieldSpec, Fields, Schema, SchemaError, Strictness, fields_from_specs,
};
use crate::typegen;
use crate::types::{Record, SourceFile};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Default shared output root.
pub const DEFAULT_BASE_DIR: &str = "generated";
/// Default project file name.
pub const PROJECT_FILE: &str = "collectgen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Collection `{collection}`: {source}")]
    Schema {
        collection: String,
        #[source]
        source: SchemaError,
    },
}

// =============================================================================
// Hooks
// =============================================================================

/// Error type returned by user hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Runs on the raw converted record before validation; may inject or repair fields.
pub type PreValidationHook =
    Arc<dyn Fn(Record, &SourceFile) -> Result<Record, HookError> + Send + Sync>;

/// Produces the artifact text from the validated record, replacing JSON output.
pub type PostConversionHook = Arc<dyn Fn(&Record) -> Result<String, HookError> + Send + Sync>;

/// Optional escape hatches around validation.
#[derive(Clone, Default)]
pub struct Hooks {
    pub pre_validation: Option<PreValidationHook>,
    pub post_conversion: Option<PostConversionHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_validation", &self.pre_validation.is_some())
            .field("post_conversion", &self.post_conversion.is_some())
            .finish()
    }
}

// =============================================================================
// User configuration
// =============================================================================

/// Output settings a collection may override. Unset keys are derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
}

type DeclareFields = Arc<dyn Fn(Fields) -> Fields + Send + Sync>;

/// A collection as declared by the user, before resolution.
///
/// ```rust
/// use collectgen::config::{AppConfig, UserConfig};
/// use collectgen::schema::FieldType;
///
/// let user = UserConfig::new("Post", "content/posts")
///     .include("*.md")
///     .fields(|f| f.field("title", FieldType::String));
/// let config = AppConfig::resolve(user).unwrap();
/// assert_eq!(config.output.variable_name, "allPosts");
/// ```
#[derive(Clone)]
pub struct UserConfig {
    pub name: String,
    pub directory: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub format: String,
    pub strictness: Strictness,
    pub output: OutputOverrides,
    pub markdown: MarkdownOptions,
    pub hooks: Hooks,
    declare_fields: Option<DeclareFields>,
}

impl UserConfig {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            format: default_format(),
            strictness: Strictness::default(),
            output: OutputOverrides::default(),
            markdown: MarkdownOptions::default(),
            hooks: Hooks::default(),
            declare_fields: None,
        }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Declare the collection's fields. Called once, during resolution.
    pub fn fields<F>(mut self, declare: F) -> Self
    where
        F: Fn(Fields) -> Fields + Send + Sync + 'static,
    {
        self.declare_fields = Some(Arc::new(declare));
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn output(mut self, output: OutputOverrides) -> Self {
        self.output = output;
        self
    }

    pub fn markdown(mut self, markdown: MarkdownOptions) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn pre_validation<F>(mut self, hook: F) -> Self
    where
        F: Fn(Record, &SourceFile) -> Result<Record, HookError> + Send + Sync + 'static,
    {
        self.hooks.pre_validation = Some(Arc::new(hook));
        self
    }

    pub fn post_conversion<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record) -> Result<String, HookError> + Send + Sync + 'static,
    {
        self.hooks.post_conversion = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("format", &self.format)
            .field("output", &self.output)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Resolved configuration
// =============================================================================

/// Where a collection's generated files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub base_dir: PathBuf,
    pub type_name: String,
    pub module_name: String,
    pub variable_name: String,
}

impl OutputConfig {
    /// `{base_dir}/{module_name}`, home of the artifacts and the aggregator.
    pub fn module_dir(&self) -> PathBuf {
        self.base_dir.join(&self.module_name)
    }
}

/// A fully-resolved collection. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub directory: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub format: String,
    pub markdown: MarkdownOptions,
    pub output: OutputConfig,
    pub hooks: Hooks,
    schema: Schema,
    type_str: String,
}

impl AppConfig {
    /// Resolve a user declaration.
    ///
    /// Fails before any I/O when the field declarations are invalid or the
    /// derived names cannot be used in generated code.
    pub fn resolve(user: UserConfig) -> Result<Self, ConfigError> {
        let name = user.name.trim().to_string();
        let normalized = normalize(&name);

        let overrides = user.output;
        let output = OutputConfig {
            base_dir: overrides
                .base_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR)),
            type_name: overrides.type_name.unwrap_or(normalized.type_name),
            module_name: overrides.module_name.unwrap_or(normalized.module_name),
            variable_name: overrides.variable_name.unwrap_or(normalized.variable_name),
        };
        validate_output(&name, &output)?;

        if user.include.is_empty() {
            return Err(ConfigError::Validation(format!(
                "collection `{name}`: include must list at least one pattern"
            )));
        }

        let declared = match &user.declare_fields {
            Some(declare) => declare(Fields::new()),
            None => Fields::new(),
        };
        let schema =
            Schema::build(&declared, user.strictness).map_err(|source| ConfigError::Schema {
                collection: name.clone(),
                source,
            })?;
        let type_str = typegen::declaration(&output.type_name, &output.variable_name, &schema);

        Ok(Self {
            name,
            directory: user.directory,
            include: user.include,
            exclude: user.exclude,
            format: user.format,
            markdown: user.markdown,
            output,
            hooks: user.hooks,
            schema,
            type_str,
        })
    }

    /// Validate a raw record against the collection schema.
    pub fn decode(&self, record: Record) -> Result<Record, DecodeError> {
        self.schema.decode(record)
    }

    /// TypeScript declaration of the record type and the exported array.
    pub fn type_str(&self) -> &str {
        &self.type_str
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

fn validate_output(name: &str, output: &OutputConfig) -> Result<(), ConfigError> {
    let invalid = |what: &str, value: &str| {
        ConfigError::Validation(format!(
            "collection `{name}`: {what} `{value}` is not a valid identifier"
        ))
    };
    if !is_identifier(&output.type_name) {
        return Err(invalid("type name", &output.type_name));
    }
    if !is_identifier(&output.variable_name) {
        return Err(invalid("variable name", &output.variable_name));
    }
    let module = output.module_name.as_str();
    if module.is_empty() || module.starts_with('.') || module.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "collection `{name}`: module name `{module}` must be a plain directory name"
        )));
    }
    Ok(())
}

// =============================================================================
// Project file
// =============================================================================

/// Project configuration loaded from `collectgen.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Shared output root for every collection.
    pub base_dir: PathBuf,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    pub collections: Vec<CollectionConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            processing: ProcessingConfig::default(),
            collections: Vec::new(),
        }
    }
}

/// One `[[collections]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    pub name: String,
    pub directory: PathBuf,
    #[serde(default = "default_include")]
    pub include: Patterns,
    #[serde(default)]
    pub exclude: Patterns,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub strictness: Strictness,
    #[serde(default)]
    pub fields: IndexMap<String, FieldSpec>,
    #[serde(default)]
    pub output: OutputOverrides,
    #[serde(default)]
    pub markdown: MarkdownOptions,
}

fn default_include() -> Patterns {
    Patterns(vec!["**/*.md".to_string()])
}

fn default_format() -> String {
    "markdown".to_string()
}

/// Glob patterns, written as a single string or an array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "OneOrMany")]
pub struct Patterns(pub Vec<String>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Patterns {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(pattern) => Patterns(vec![pattern]),
            OneOrMany::Many(patterns) => Patterns(patterns),
        }
    }
}

impl From<Patterns> for OneOrMany {
    fn from(value: Patterns) -> Self {
        OneOrMany::Many(value.0)
    }
}

impl CollectionConfig {
    /// Turn this entry into a [`UserConfig`], filling `output.base_dir` from
    /// the project when unset.
    pub fn to_user_config(&self, project_base_dir: &Path) -> Result<UserConfig, ConfigError> {
        let fields = fields_from_specs(&self.fields).map_err(|source| ConfigError::Schema {
            collection: self.name.clone(),
            source,
        })?;

        let mut output = self.output.clone();
        if output.base_dir.is_none() {
            output.base_dir = Some(project_base_dir.to_path_buf());
        }

        let mut user = UserConfig::new(&self.name, &self.directory)
            .format(&self.format)
            .strictness(self.strictness)
            .output(output)
            .markdown(self.markdown.clone())
            .fields(move |_| fields.clone());
        user.include = self.include.0.clone();
        user.exclude = self.exclude.0.clone();
        Ok(user)
    }
}

impl ProjectConfig {
    /// Validate values that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        let mut names = std::collections::HashSet::new();
        for collection in &self.collections {
            if collection.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "collections.name must not be empty".into(),
                ));
            }
            if !names.insert(collection.name.trim()) {
                return Err(ConfigError::Validation(format!(
                    "collection `{}` is declared twice",
                    collection.name
                )));
            }
            if collection.include.0.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "collection `{}`: include must list at least one pattern",
                    collection.name
                )));
            }
        }
        Ok(())
    }

    /// Resolve every collection, rejecting two that share an output module.
    pub fn app_configs(&self) -> Result<Vec<AppConfig>, ConfigError> {
        let mut configs: Vec<AppConfig> = Vec::with_capacity(self.collections.len());
        for collection in &self.collections {
            let config = AppConfig::resolve(collection.to_user_config(&self.base_dir)?)?;
            for other in &configs {
                let (a, b) = (&other.output, &config.output);
                let clash = if a.module_dir() == b.module_dir() {
                    Some(format!("write to {}", b.module_dir().display()))
                } else if a.base_dir != b.base_dir {
                    None
                } else if a.variable_name == b.variable_name {
                    Some(format!("export `{}`", b.variable_name))
                } else if a.type_name == b.type_name {
                    Some(format!("declare type `{}`", b.type_name))
                } else {
                    None
                };
                if let Some(clash) = clash {
                    return Err(ConfigError::Validation(format!(
                        "collections `{}` and `{}` both {clash}",
                        other.name, config.name
                    )));
                }
            }
            configs.push(config);
        }
        Ok(configs)
    }

    /// Join relative paths onto `root`.
    fn anchor(mut self, root: &Path) -> Self {
        self.base_dir = root.join(&self.base_dir);
        for collection in &mut self.collections {
            collection.directory = root.join(&collection.directory);
            if let Some(base_dir) = &collection.output.base_dir {
                collection.output.base_dir = Some(root.join(base_dir));
            }
        }
        self
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of conversion threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ProjectConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so
///   `[[collections]]` from the user replaces the (empty) stock list.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_project(overlay: Option<toml::Value>) -> Result<ProjectConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a project file.
///
/// A missing file yields the stock defaults (no collections). Relative paths
/// in the file are anchored at the file's directory.
pub fn load_project(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(resolve_project(overlay)?.anchor(&root))
}

/// Returns a fully-commented stock `collectgen.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# collectgen configuration
# ========================
# Values shown are the defaults. Paths are relative to this file.
# Unknown keys will cause an error.

# Shared output root. Every collection writes to {base_dir}/{module_name}/,
# and the combined index.mjs / index.d.ts live directly in base_dir.
base_dir = "generated"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion threads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4

# ---------------------------------------------------------------------------
# Collections
# ---------------------------------------------------------------------------
# Declare one [[collections]] block per collection. Example:
#
# [[collections]]
# name = "Post"                 # -> type Post, module posts, variable allPosts
# directory = "content/posts"
# include = "**/*.md"           # string or array of globs
# exclude = ["drafts/**"]
# format = "markdown"
# strictness = "ignore"         # unknown fields: ignore | error | preserve
#
# [collections.fields]
# title = "string"
# date = "string?"              # trailing ? = optional
# tags = "string[]"             # trailing [] = array
# status = { type = "literal", values = ["draft", "published"] }
# author = { type = "object", fields = { name = "string", url = "string?" } }
#
# [collections.output]          # each key independently overridable
# base_dir = "generated"
# type_name = "Post"
# module_name = "posts"
# variable_name = "allPosts"
#
# [collections.markdown]
# allow_dangerous_html = false  # pass raw HTML through unescaped
"##
}
