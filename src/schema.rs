//! Collection schemas: declaration, compilation and decoding.
//!
//! A collection declares its fields once. That single declaration is the
//! source of truth for two things that must never drift apart:
//!
//! - **Runtime validation**: [`Schema::decode`] checks every converted record
//!   before it is written.
//! - **Static typing**: [`crate::typegen`] prints the TypeScript declaration
//!   from the same [`Schema`].
//!
//! ## Declaring Fields
//!
//! In Rust, fields are declared with the [`Fields`] builder:
//!
//! ```rust
//! use collectgen::schema::{FieldType, Fields};
//!
//! let fields = Fields::new()
//!     .field("title", FieldType::String)
//!     .optional("date", FieldType::String)
//!     .field("tags", FieldType::array(FieldType::String));
//! assert_eq!(fields.len(), 3);
//! ```
//!
//! In `collectgen.toml`, each field is a [`FieldSpec`]: either a short type
//! string (`"string"`, `"number[]"`, `"boolean?"`) or a table with a `type` key
//! (`{ type = "literal", values = ["draft", "published"] }`).
//!
//! ## Reserved Fields
//!
//! Every compiled schema ends with two fields the pipeline owns: `body` (the
//! rendered document) and `_meta` (provenance, see [`crate::metadata`]). User
//! declarations may not use either name.

use crate::types::Record;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const BODY_FIELD: &str = "body";
pub const META_FIELD: &str = "_meta";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Field name must not be empty (under `{0}`)")]
    EmptyName(String),
    #[error("Duplicate field `{0}`")]
    Duplicate(String),
    #[error("Field `{0}` is reserved for pipeline metadata")]
    Reserved(String),
    #[error("Field `{field}` has unknown type `{type_name}`")]
    UnknownType { field: String, type_name: String },
    #[error("Field `{0}` is a literal without any allowed values")]
    EmptyLiteral(String),
    #[error("Field `{field}`: {message}")]
    Invalid { field: String, message: String },
}

/// Type of a single declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    /// Any JSON value, passed through unchecked.
    Unknown,
    /// One of a fixed set of JSON values.
    Literal(Vec<Value>),
    Array(Box<FieldType>),
    Object(Fields),
    /// May be absent (or `null`, which is dropped).
    Optional(Box<FieldType>),
}

impl FieldType {
    pub fn array(item: FieldType) -> Self {
        FieldType::Array(Box::new(item))
    }

    pub fn optional(inner: FieldType) -> Self {
        match inner {
            FieldType::Optional(_) => inner,
            other => FieldType::Optional(Box::new(other)),
        }
    }

    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FieldType::Literal(values.into_iter().map(Into::into).collect())
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldType::Optional(_))
    }

    /// Short description used in decode error messages.
    fn describe(&self) -> String {
        match self {
            FieldType::String => "string".into(),
            FieldType::Number => "number".into(),
            FieldType::Integer => "integer".into(),
            FieldType::Boolean => "boolean".into(),
            FieldType::Unknown => "any value".into(),
            FieldType::Literal(values) => {
                let options: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("one of {}", options.join(" | "))
            }
            FieldType::Array(item) => format!("array of {}", item.describe()),
            FieldType::Object(_) => "object".into(),
            FieldType::Optional(inner) => inner.describe(),
        }
    }
}

/// A named field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

/// An ordered list of field declarations.
///
/// Duplicates are accepted here and rejected by [`Schema::build`], so that a
/// bad declaration is reported with its name instead of silently overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.0.push(Field {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn optional(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field(name, FieldType::optional(ty))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.0.iter().find(|f| f.name == name)
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        Fields(iter.into_iter().collect())
    }
}

/// How keys that no field declares are treated during decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Undeclared keys are dropped from the output.
    #[default]
    Ignore,
    /// Undeclared keys fail validation.
    Error,
    /// Undeclared keys are kept verbatim after the declared ones.
    Preserve,
}

// =============================================================================
// Project-file field syntax
// =============================================================================

/// A field as written in `collectgen.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// `"string"`, `"integer[]"`, `"boolean?"`
    Short(String),
    Table(FieldTable),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldTable {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<IndexMap<String, FieldSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

impl FieldSpec {
    /// Resolve the written form into a [`FieldType`].
    pub fn to_field_type(&self, field: &str) -> Result<FieldType, SchemaError> {
        match self {
            FieldSpec::Short(s) => parse_short_type(field, s),
            FieldSpec::Table(table) => {
                let ty = match table.kind.as_str() {
                    "array" => {
                        let items = table.items.as_ref().ok_or_else(|| SchemaError::Invalid {
                            field: field.to_string(),
                            message: "array needs an `items` type".into(),
                        })?;
                        FieldType::array(items.to_field_type(field)?)
                    }
                    "object" => {
                        let nested = table.fields.as_ref().ok_or_else(|| SchemaError::Invalid {
                            field: field.to_string(),
                            message: "object needs a `fields` table".into(),
                        })?;
                        FieldType::Object(fields_from_specs(nested)?)
                    }
                    "literal" => FieldType::Literal(table.values.clone().unwrap_or_default()),
                    other => parse_short_type(field, other)?,
                };
                Ok(if table.optional {
                    FieldType::optional(ty)
                } else {
                    ty
                })
            }
        }
    }
}

/// Resolve an ordered map of written fields.
pub fn fields_from_specs(specs: &IndexMap<String, FieldSpec>) -> Result<Fields, SchemaError> {
    specs
        .iter()
        .map(|(name, spec)| {
            Ok(Field {
                name: name.clone(),
                ty: spec.to_field_type(name)?,
            })
        })
        .collect()
}

fn parse_short_type(field: &str, written: &str) -> Result<FieldType, SchemaError> {
    let written = written.trim();
    if let Some(inner) = written.strip_suffix('?') {
        return Ok(FieldType::optional(parse_short_type(field, inner)?));
    }
    if let Some(item) = written.strip_suffix("[]") {
        return Ok(FieldType::array(parse_short_type(field, item)?));
    }
    match written {
        "string" => Ok(FieldType::String),
        "number" => Ok(FieldType::Number),
        "integer" => Ok(FieldType::Integer),
        "boolean" => Ok(FieldType::Boolean),
        "unknown" => Ok(FieldType::Unknown),
        "array" | "object" | "literal" => Err(SchemaError::Invalid {
            field: field.to_string(),
            message: format!("`{written}` must be written as a table with its parameters"),
        }),
        other => Err(SchemaError::UnknownType {
            field: field.to_string(),
            type_name: other.to_string(),
        }),
    }
}

// =============================================================================
// Compiled schema
// =============================================================================

/// A validated field list with the reserved fields appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Fields,
    strictness: Strictness,
}

/// Shape of the `_meta` block every record carries.
pub fn meta_fields() -> Fields {
    Fields::new()
        .field("sourceFileName", FieldType::String)
        .field("sourceDirectory", FieldType::String)
        .field("sourceFileType", FieldType::String)
        .field("slug", FieldType::String)
}

impl Schema {
    /// Check user declarations and compose them with `body` and `_meta`.
    ///
    /// Pure and synchronous: runs at config resolution, before any I/O.
    pub fn build(user_fields: &Fields, strictness: Strictness) -> Result<Self, SchemaError> {
        for field in user_fields {
            if field.name == BODY_FIELD || field.name == META_FIELD {
                return Err(SchemaError::Reserved(field.name.clone()));
            }
        }
        check_fields(user_fields, "")?;

        let fields = user_fields
            .iter()
            .cloned()
            .chain([
                Field {
                    name: BODY_FIELD.to_string(),
                    ty: FieldType::String,
                },
                Field {
                    name: META_FIELD.to_string(),
                    ty: FieldType::Object(meta_fields()),
                },
            ])
            .collect();

        Ok(Self { fields, strictness })
    }

    /// All fields, user declarations first, reserved fields last.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Validate a record and return it normalized to the schema.
    ///
    /// Declared fields come out in declaration order. Every problem found is
    /// reported, not just the first one; any problem fails the whole record.
    pub fn decode(&self, record: Record) -> Result<Record, DecodeError> {
        let mut issues = Vec::new();
        let decoded = decode_object(&self.fields, record, "", self.strictness, &mut issues);
        if issues.is_empty() {
            Ok(decoded)
        } else {
            Err(DecodeError { issues })
        }
    }
}

fn check_fields(fields: &Fields, parent: &str) -> Result<(), SchemaError> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        let path = join_path(parent, &field.name);
        if field.name.is_empty() {
            let under = if parent.is_empty() { "<root>" } else { parent };
            return Err(SchemaError::EmptyName(under.to_string()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::Duplicate(path));
        }
        check_type(&field.ty, &path)?;
    }
    Ok(())
}

fn check_type(ty: &FieldType, path: &str) -> Result<(), SchemaError> {
    match ty {
        FieldType::Literal(values) if values.is_empty() => {
            Err(SchemaError::EmptyLiteral(path.to_string()))
        }
        FieldType::Array(item) => check_type(item, &format!("{path}[]")),
        FieldType::Optional(inner) => check_type(inner, path),
        FieldType::Object(nested) if nested.is_empty() => Err(SchemaError::Invalid {
            field: path.to_string(),
            message: "object needs at least one field".into(),
        }),
        FieldType::Object(nested) => check_fields(nested, path),
        _ => Ok(()),
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// One mismatch between a record and its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Dotted path to the offending value (`author.name`, `tags[2]`).
    pub path: String,
    pub message: String,
}

/// A record failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record does not match schema{}", issue_list(.issues))]
pub struct DecodeError {
    pub issues: Vec<Issue>,
}

impl DecodeError {
    /// Whether any issue points at `path`.
    pub fn mentions(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

fn issue_list(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|issue| format!("\n  - {}: {}", issue.path, issue.message))
        .collect()
}

fn decode_object(
    fields: &Fields,
    mut input: Record,
    path: &str,
    strictness: Strictness,
    issues: &mut Vec<Issue>,
) -> Record {
    let mut output = Record::new();

    for field in fields {
        let field_path = join_path(path, &field.name);
        let value = input.shift_remove(&field.name);
        match (value, &field.ty) {
            (None | Some(Value::Null), FieldType::Optional(_)) => {}
            (None, _) => issues.push(Issue {
                path: field_path,
                message: "is missing".into(),
            }),
            (Some(value), ty) => {
                if let Some(decoded) = decode_value(ty, value, &field_path, strictness, issues) {
                    output.insert(field.name.clone(), decoded);
                }
            }
        }
    }

    match strictness {
        Strictness::Ignore => {}
        Strictness::Error => {
            for key in input.keys() {
                issues.push(Issue {
                    path: join_path(path, key),
                    message: "is not declared in the schema".into(),
                });
            }
        }
        Strictness::Preserve => output.extend(input),
    }

    output
}

fn decode_value(
    ty: &FieldType,
    value: Value,
    path: &str,
    strictness: Strictness,
    issues: &mut Vec<Issue>,
) -> Option<Value> {
    match ty {
        FieldType::Optional(inner) => {
            return decode_value(inner, value, path, strictness, issues);
        }
        FieldType::Array(item) => {
            if let Value::Array(items) = value {
                let decoded = items
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, v)| {
                        decode_value(item, v, &format!("{path}[{i}]"), strictness, issues)
                    })
                    .collect();
                return Some(Value::Array(decoded));
            }
        }
        FieldType::Object(nested) => {
            if let Value::Object(map) = value {
                return Some(Value::Object(decode_object(
                    nested, map, path, strictness, issues,
                )));
            }
        }
        _ => {}
    }

    let matches = match (ty, &value) {
        (FieldType::Unknown, _) => true,
        (FieldType::String, Value::String(_)) => true,
        (FieldType::Number, Value::Number(_)) => true,
        (FieldType::Integer, Value::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        (FieldType::Boolean, Value::Bool(_)) => true,
        (FieldType::Literal(allowed), v) => allowed.contains(v),
        _ => false,
    };

    if matches {
        Some(value)
    } else {
        issues.push(Issue {
            path: path.to_string(),
            message: format!("expected {}, got {}", ty.describe(), describe_value(&value)),
        });
        None
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) if s.chars().count() > 40 => {
            let head: String = s.chars().take(40).collect();
            format!("string \"{head}...\"")
        }
        Value::String(s) => format!("string \"{s}\""),
        Value::Array(items) => format!("array of {} items", items.len()),
        Value::Object(_) => "object".into(),
    }
}
