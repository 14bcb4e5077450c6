//! TypeScript declaration printer.
//!
//! Prints the static type of a collection from its compiled [`Schema`], so the
//! declaration in `index.d.ts` always matches what [`Schema::decode`] accepts.
//!
//! ```text
//! type Post = { readonly title: string; readonly date?: string | undefined; readonly body: string; readonly _meta: { ... } }
//! export declare const allPosts: Post[]
//! ```

use crate::naming::is_identifier;
use crate::schema::{FieldType, Fields, Schema};
use serde_json::Value;

/// Full declaration for one collection: the record type plus the exported array.
pub fn declaration(type_name: &str, variable_name: &str, schema: &Schema) -> String {
    format!(
        "type {type_name} = {}\nexport declare const {variable_name}: {type_name}[]",
        print_object(schema.fields())
    )
}

/// `{ readonly a: T; readonly b?: U | undefined }`
pub fn print_object(fields: &Fields) -> String {
    if fields.is_empty() {
        return "{}".to_string();
    }
    let members: Vec<String> = fields
        .iter()
        .map(|field| {
            let key = property_key(&field.name);
            match &field.ty {
                FieldType::Optional(inner) => {
                    format!("readonly {key}?: {} | undefined", print_type(inner))
                }
                ty => format!("readonly {key}: {}", print_type(ty)),
            }
        })
        .collect();
    format!("{{ {} }}", members.join("; "))
}

pub fn print_type(ty: &FieldType) -> String {
    match ty {
        FieldType::String => "string".to_string(),
        FieldType::Number | FieldType::Integer => "number".to_string(),
        FieldType::Boolean => "boolean".to_string(),
        FieldType::Unknown => "unknown".to_string(),
        FieldType::Literal(values) => values
            .iter()
            .map(print_literal)
            .collect::<Vec<_>>()
            .join(" | "),
        FieldType::Array(item) => format!("ReadonlyArray<{}>", print_type(item)),
        FieldType::Object(fields) => print_object(fields),
        FieldType::Optional(inner) => format!("{} | undefined", print_type(inner)),
    }
}

fn print_literal(value: &Value) -> String {
    match value {
        // Composite literals have no TypeScript literal type
        Value::Array(_) | Value::Object(_) => "unknown".to_string(),
        other => other.to_string(),
    }
}

fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        Value::String(name.to_string()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Strictness;

    fn post_schema() -> Schema {
        Schema::build(
            &Fields::new()
                .field("title", FieldType::String)
                .optional("date", FieldType::String),
            Strictness::Ignore,
        )
        .unwrap()
    }

    #[test]
    fn declaration_names_type_and_variable() {
        let text = declaration("Post", "allPosts", &post_schema());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("type Post = { readonly title: string; "));
        assert_eq!(lines[1], "export declare const allPosts: Post[]");
    }

    #[test]
    fn optional_members_are_marked() {
        let text = declaration("Post", "allPosts", &post_schema());
        assert!(text.contains("readonly date?: string | undefined;"));
    }

    #[test]
    fn reserved_fields_come_last() {
        let text = declaration("Post", "allPosts", &post_schema());
        let body = text.find("readonly body: string").unwrap();
        let meta = text.find("readonly _meta: { readonly sourceFileName: string;").unwrap();
        let title = text.find("readonly title").unwrap();
        assert!(title < body && body < meta);
        assert!(text.contains("readonly slug: string } }"));
    }

    #[test]
    fn arrays_and_literals() {
        assert_eq!(
            print_type(&FieldType::array(FieldType::Integer)),
            "ReadonlyArray<number>"
        );
        assert_eq!(
            print_type(&FieldType::literal(["draft", "published"])),
            r#""draft" | "published""#
        );
        assert_eq!(
            print_type(&FieldType::literal([Value::from(1), Value::Bool(true)])),
            "1 | true"
        );
    }

    #[test]
    fn nested_objects_print_recursively() {
        let ty = FieldType::Object(
            Fields::new()
                .field("name", FieldType::String)
                .optional("url", FieldType::String),
        );
        assert_eq!(
            print_type(&ty),
            "{ readonly name: string; readonly url?: string | undefined }"
        );
    }

    #[test]
    fn non_identifier_keys_are_quoted() {
        let fields = Fields::new()
            .field("cover-image", FieldType::String)
            .field("default", FieldType::Boolean);
        assert_eq!(
            print_object(&fields),
            r#"{ readonly "cover-image": string; readonly "default": boolean }"#
        );
    }
}
