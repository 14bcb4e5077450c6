//! Record validation.
//!
//! All-or-nothing per record: a record either decodes completely against the
//! collection schema or is rejected with every issue found.

use crate::config::AppConfig;
use crate::schema::{DecodeError, Schema};
use crate::types::Record;

pub trait ContentValidator: Send + Sync {
    /// Check `record` and return it normalized to the schema.
    fn validate(&self, record: Record) -> Result<Record, DecodeError>;
}

/// Validator backed by a collection's compiled schema.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Schema,
}

impl SchemaValidator {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn for_config(config: &AppConfig) -> Self {
        Self::new(config.schema().clone())
    }
}

impl ContentValidator for SchemaValidator {
    fn validate(&self, record: Record) -> Result<Record, DecodeError> {
        self.schema.decode(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserConfig;
    use crate::schema::{FieldType, Strictness};
    use serde_json::json;

    fn validator(strictness: Strictness) -> SchemaValidator {
        let config = AppConfig::resolve(
            UserConfig::new("Post", "content")
                .include("*.md")
                .strictness(strictness)
                .fields(|f| f.field("title", FieldType::String)),
        )
        .unwrap();
        SchemaValidator::for_config(&config)
    }

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    fn meta() -> serde_json::Value {
        json!({
            "sourceFileName": "hello.md",
            "sourceDirectory": "content",
            "sourceFileType": "md",
            "slug": "hello"
        })
    }

    #[test]
    fn valid_record_passes_in_schema_order() {
        let out = validator(Strictness::Ignore)
            .validate(record(json!({"body": "b", "_meta": meta(), "title": "Hello"})))
            .unwrap();
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "body", "_meta"]);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = validator(Strictness::Ignore)
            .validate(record(json!({"body": "b", "_meta": meta()})))
            .unwrap_err();
        assert!(err.mentions("title"));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn extra_fields_follow_strictness() {
        let input = json!({"title": "t", "extra": 1, "body": "b", "_meta": meta()});

        let ignored = validator(Strictness::Ignore)
            .validate(record(input.clone()))
            .unwrap();
        assert!(!ignored.contains_key("extra"));

        let preserved = validator(Strictness::Preserve)
            .validate(record(input.clone()))
            .unwrap();
        assert_eq!(preserved["extra"], 1);

        let err = validator(Strictness::Error)
            .validate(record(input))
            .unwrap_err();
        assert!(err.mentions("extra"));
    }
}
