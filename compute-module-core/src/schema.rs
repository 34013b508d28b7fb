//! Schema translation
//!
//! Converts JSON-Schema-shaped type descriptions into the catalog format
//! understood by the job-issuing service. Only the subset that maps onto the
//! catalog is interpreted: `object` (with `properties`), `array` (with
//! `items`), `boolean`, `integer`, `number` and `string`. Anything else
//! degrades to the unknown type instead of failing.

use serde_json::Value;

use crate::dto::schema::{DataType, Field, PrimitiveType, SchemaCatalogEntry, StructType};

/// Builds the catalog entry for a handler
///
/// # Arguments
/// * `name` - Query type the handler is registered under
/// * `input` - Description of the query payload; expected to be an object type
/// * `output` - Description of the response
pub fn translate_schema(name: &str, input: &Value, output: &Value) -> SchemaCatalogEntry {
    SchemaCatalogEntry {
        name: name.to_string(),
        input_type: struct_type(input),
        output_type: data_type(output),
    }
}

/// Translates a single type description
pub fn data_type(description: &Value) -> DataType {
    match description.get("type").and_then(Value::as_str) {
        Some("object") => DataType::structure(struct_type(description).fields),
        Some("array") => match description.get("items") {
            Some(items) => DataType::list(data_type(items)),
            None => DataType::unknown(),
        },
        Some("boolean") => DataType::primitive(PrimitiveType::Bool),
        Some("integer") => DataType::primitive(PrimitiveType::Int),
        Some("number") => DataType::primitive(PrimitiveType::Float),
        Some("string") => DataType::primitive(PrimitiveType::String),
        _ => DataType::unknown(),
    }
}

/// Field order follows declaration order of `properties`.
fn struct_type(description: &Value) -> StructType {
    let fields = description
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| Field {
                    name: name.clone(),
                    data_type: data_type(property),
                })
                .collect()
        })
        .unwrap_or_default();

    StructType { fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, data_type: DataType) -> Field {
        Field {
            name: name.to_string(),
            data_type,
        }
    }

    #[test]
    fn test_object_with_string_and_boolean_fields() {
        let input = json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "urgent": { "type": "boolean" }
            }
        });
        let output = json!({ "type": "boolean" });

        let entry = translate_schema("notify", &input, &output);

        assert_eq!(entry.name, "notify");
        assert_eq!(
            entry.input_type.fields,
            vec![
                field("message", DataType::primitive(PrimitiveType::String)),
                field("urgent", DataType::primitive(PrimitiveType::Bool)),
            ]
        );
        assert_eq!(entry.output_type, DataType::primitive(PrimitiveType::Bool));
    }

    #[test]
    fn test_field_order_follows_declaration_order() {
        let input = json!({
            "type": "object",
            "properties": {
                "zeta": { "type": "integer" },
                "alpha": { "type": "number" },
                "mid": { "type": "string" }
            }
        });

        let entry = translate_schema("ordered", &input, &json!({ "type": "string" }));
        let names: Vec<_> = entry.input_type.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let description = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            }
        });

        assert_eq!(
            data_type(&description),
            DataType::list(DataType::structure(vec![field(
                "tags",
                DataType::list(DataType::primitive(PrimitiveType::String))
            )]))
        );
    }

    #[test]
    fn test_unrecognized_shapes_degrade_to_unknown() {
        assert_eq!(data_type(&json!({ "type": "null" })), DataType::unknown());
        assert_eq!(data_type(&json!({ "anyOf": [] })), DataType::unknown());
        assert_eq!(data_type(&json!("string")), DataType::unknown());
        assert_eq!(data_type(&json!({ "type": "array" })), DataType::unknown());
    }

    #[test]
    fn test_non_object_input_yields_empty_struct() {
        let entry = translate_schema("bare", &json!({ "type": "string" }), &json!({}));
        assert!(entry.input_type.fields.is_empty());
        assert_eq!(entry.output_type, DataType::unknown());
    }
}
