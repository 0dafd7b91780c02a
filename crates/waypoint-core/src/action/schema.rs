//! A compact JSON-schema validator.
//!
//! Supports the keywords `type`, `properties`, `required`,
//! `additionalProperties` (boolean), `enum`, `items`, `minLength`,
//! `maxLength`, `minimum` and `maximum`. Annotation keywords (`$schema`,
//! `$id`, `title`, `description`, `default`, `examples`) are accepted and
//! ignored. Any other keyword is rejected at compile time.

use std::collections::BTreeMap;

use serde_json::Value;

const ANNOTATIONS: &[&str] = &["$schema", "$id", "title", "description", "default", "examples"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "object" => JsonType::Object,
            "array" => JsonType::Array,
            "string" => JsonType::String,
            "number" => JsonType::Number,
            "integer" => JsonType::Integer,
            "boolean" => JsonType::Boolean,
            "null" => JsonType::Null,
            _ => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Boolean => "boolean",
            JsonType::Null => "null",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            JsonType::Object => value.is_object(),
            JsonType::Array => value.is_array(),
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Integer => value.as_f64().is_some_and(|n| n.fract() == 0.0),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Null => value.is_null(),
        }
    }
}

/// A compiled schema node.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: Option<Vec<JsonType>>,
    properties: BTreeMap<String, Schema>,
    required: Vec<String>,
    additional_properties: Option<bool>,
    enum_values: Option<Vec<Value>>,
    items: Option<Box<Schema>>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl Schema {
    /// Compile a schema document. The error names the offending keyword and path.
    pub fn compile(doc: &Value) -> Result<Self, String> {
        compile_at(doc, "#")
    }

    /// Validate a value, returning every violation found (empty when valid).
    pub fn validate(&self, value: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        self.check(value, "", &mut errors);
        errors
    }

    fn check(&self, value: &Value, path: &str, errors: &mut Vec<String>) {
        let at = if path.is_empty() { "/" } else { path };

        if let Some(types) = &self.types {
            if !types.iter().any(|t| t.matches(value)) {
                let names: Vec<&str> = types.iter().map(JsonType::name).collect();
                errors.push(format!("{at} must be {}", names.join(" or ")));
                // Keyword checks below assume the declared type.
                return;
            }
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                errors.push(format!("{at} must be equal to one of the allowed values"));
            }
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count() as u64;
            if let Some(min) = self.min_length {
                if len < min {
                    errors.push(format!("{at} must NOT have fewer than {min} characters"));
                }
            }
            if let Some(max) = self.max_length {
                if len > max {
                    errors.push(format!("{at} must NOT have more than {max} characters"));
                }
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum {
                if n < min {
                    errors.push(format!("{at} must be >= {min}"));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    errors.push(format!("{at} must be <= {max}"));
                }
            }
        }

        if let Some(map) = value.as_object() {
            for name in &self.required {
                if !map.contains_key(name) {
                    errors.push(format!("{at} must have required property '{name}'"));
                }
            }
            for (name, child) in map {
                let child_path = format!("{path}/{name}");
                match self.properties.get(name) {
                    Some(schema) => schema.check(child, &child_path, errors),
                    None if self.additional_properties == Some(false) => {
                        errors.push(format!("{at} must NOT have additional property '{name}'"));
                    }
                    None => {}
                }
            }
        }

        if let (Some(items), Some(list)) = (&self.items, value.as_array()) {
            for (i, item) in list.iter().enumerate() {
                items.check(item, &format!("{path}/{i}"), errors);
            }
        }
    }
}

fn compile_at(doc: &Value, path: &str) -> Result<Schema, String> {
    let map = doc
        .as_object()
        .ok_or_else(|| format!("{path}: schema must be an object"))?;

    let mut schema = Schema::default();
    for (keyword, value) in map {
        let here = format!("{path}/{keyword}");
        match keyword.as_str() {
            "type" => {
                let names: Vec<&str> = match value {
                    Value::String(s) => vec![s.as_str()],
                    Value::Array(list) => list
                        .iter()
                        .map(|v| v.as_str().ok_or_else(|| format!("{here}: must be a string")))
                        .collect::<Result<_, _>>()?,
                    _ => return Err(format!("{here}: must be a string or array of strings")),
                };
                let types = names
                    .into_iter()
                    .map(|n| JsonType::parse(n).ok_or_else(|| format!("{here}: unknown type '{n}'")))
                    .collect::<Result<Vec<_>, _>>()?;
                schema.types = Some(types);
            }
            "properties" => {
                let props = value
                    .as_object()
                    .ok_or_else(|| format!("{here}: must be an object"))?;
                for (name, sub) in props {
                    schema
                        .properties
                        .insert(name.clone(), compile_at(sub, &format!("{here}/{name}"))?);
                }
            }
            "required" => {
                let list = value
                    .as_array()
                    .ok_or_else(|| format!("{here}: must be an array"))?;
                schema.required = list
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| format!("{here}: entries must be strings"))
                    })
                    .collect::<Result<_, _>>()?;
            }
            "additionalProperties" => {
                schema.additional_properties = Some(
                    value
                        .as_bool()
                        .ok_or_else(|| format!("{here}: must be a boolean"))?,
                );
            }
            "enum" => {
                let list = value
                    .as_array()
                    .ok_or_else(|| format!("{here}: must be an array"))?;
                schema.enum_values = Some(list.clone());
            }
            "items" => {
                schema.items = Some(Box::new(compile_at(value, &here)?));
            }
            "minLength" => schema.min_length = Some(non_negative(value, &here)?),
            "maxLength" => schema.max_length = Some(non_negative(value, &here)?),
            "minimum" => {
                schema.minimum = Some(value.as_f64().ok_or_else(|| format!("{here}: must be a number"))?);
            }
            "maximum" => {
                schema.maximum = Some(value.as_f64().ok_or_else(|| format!("{here}: must be a number"))?);
            }
            other if ANNOTATIONS.contains(&other) => {}
            other => return Err(format!("{path}: unknown keyword '{other}'")),
        }
    }
    Ok(schema)
}

fn non_negative(value: &Value, here: &str) -> Result<u64, String> {
    value
        .as_u64()
        .ok_or_else(|| format!("{here}: must be a non-negative integer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> Schema {
        Schema::compile(&json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "minLength": 2, "maxLength": 10 },
                "age": { "type": "integer", "minimum": 0, "maximum": 150 },
                "role": { "enum": ["admin", "user"] },
                "tags": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["name"],
            "additionalProperties": false
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_document() {
        let errors = person().validate(&json!({
            "name": "Ada",
            "age": 36,
            "role": "admin",
            "tags": ["math"]
        }));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_collects_every_violation() {
        let errors = person().validate(&json!({
            "age": 200.5,
            "role": "root",
            "tags": ["ok", 3],
            "extra": true
        }));
        assert!(errors.contains(&"/ must have required property 'name'".to_string()));
        assert!(errors.contains(&"/age must be integer".to_string()));
        assert!(errors.contains(&"/role must be equal to one of the allowed values".to_string()));
        assert!(errors.contains(&"/tags/1 must be string".to_string()));
        assert!(errors.contains(&"/ must NOT have additional property 'extra'".to_string()));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_string_length_and_numeric_bounds() {
        let errors = person().validate(&json!({ "name": "A", "age": -1 }));
        assert_eq!(
            errors,
            vec![
                "/age must be >= 0".to_string(),
                "/name must NOT have fewer than 2 characters".to_string(),
            ]
        );
    }

    #[test]
    fn test_type_union() {
        let schema = Schema::compile(&json!({ "type": ["string", "null"] })).unwrap();
        assert!(schema.validate(&json!(null)).is_empty());
        assert!(schema.validate(&json!("x")).is_empty());
        assert_eq!(schema.validate(&json!(1)), vec!["/ must be string or null".to_string()]);
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        let schema = Schema::compile(&json!({})).unwrap();
        assert!(schema.validate(&json!({ "anything": [1, 2] })).is_empty());
    }

    #[test]
    fn test_invalid_schemas_rejected() {
        assert!(Schema::compile(&json!("object")).is_err());
        assert!(Schema::compile(&json!({ "type": "thing" })).unwrap_err().contains("thing"));
        assert!(Schema::compile(&json!({ "required": "name" })).is_err());
        assert!(Schema::compile(&json!({ "minLength": -1 })).is_err());
        assert!(
            Schema::compile(&json!({ "properties": { "a": { "pattern": "x" } } }))
                .unwrap_err()
                .contains("pattern")
        );
    }

    #[test]
    fn test_annotations_ignored() {
        let schema = Schema::compile(&json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Payload",
            "type": "object"
        }))
        .unwrap();
        assert!(schema.validate(&json!({})).is_empty());
    }
}
