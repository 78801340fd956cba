//! JSON Parser
//!
//! Provides utilities for walking `serde_json` values.

use crate::error::{ParseError, Result};
use serde_json::{Map, Value as JsonValue};

/// JSON parser utilities
pub struct JsonParser;

impl JsonParser {
    /// Parse JSON string into a JSON value
    pub fn parse(json_str: &str) -> Result<JsonValue> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Name of a value's JSON type, for error messages
    pub fn type_name(value: &JsonValue) -> &'static str {
        match value {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(_) => "number",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }

    /// Require a value to be an object
    pub fn as_object<'a>(value: &'a JsonValue, field: &str) -> Result<&'a Map<String, JsonValue>> {
        value.as_object().ok_or_else(|| ParseError::TypeMismatch {
            field: field.to_string(),
            expected: "object".to_string(),
            actual: Self::type_name(value).to_string(),
        })
    }

    /// Split a single-key object (`{"unit": {...}}`) into its key and body
    pub fn single_key<'a>(value: &'a JsonValue, context: &str) -> Result<(&'a str, &'a JsonValue)> {
        let obj = Self::as_object(value, context)?;
        let mut entries = obj.iter();
        match (entries.next(), entries.next()) {
            (Some((key, body)), None) => Ok((key.as_str(), body)),
            (None, _) => Err(ParseError::InvalidValue {
                field: context.to_string(),
                message: "empty node object".to_string(),
            }),
            (Some(_), Some(_)) => Err(ParseError::InvalidValue {
                field: context.to_string(),
                message: format!(
                    "node object must have exactly one key, got {}",
                    obj.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            }),
        }
    }

    /// Get a required string field from JSON object
    pub fn get_string(obj: &JsonValue, field: &str) -> Result<String> {
        obj.get(field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ParseError::MissingField {
                field: field.to_string(),
            })
    }

    /// Get an optional string field from JSON object (`null` counts as absent)
    pub fn get_optional_string(obj: &JsonValue, field: &str) -> Option<String> {
        obj.get(field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Get a required field
    pub fn get_field<'a>(obj: &'a JsonValue, field: &str) -> Result<&'a JsonValue> {
        obj.get(field).ok_or_else(|| ParseError::MissingField {
            field: field.to_string(),
        })
    }

    /// Get an optional array field; absent or `null` yields an empty slice
    pub fn get_optional_array<'a>(obj: &'a JsonValue, field: &str) -> Result<&'a [JsonValue]> {
        match obj.get(field) {
            None | Some(JsonValue::Null) => Ok(&[]),
            Some(JsonValue::Array(items)) => Ok(items.as_slice()),
            Some(other) => Err(ParseError::TypeMismatch {
                field: field.to_string(),
                expected: "array".to_string(),
                actual: Self::type_name(other).to_string(),
            }),
        }
    }

    /// Get a required array field
    pub fn get_array<'a>(obj: &'a JsonValue, field: &str) -> Result<&'a [JsonValue]> {
        Self::get_field(obj, field)?;
        Self::get_optional_array(obj, field)
    }

    /// Get an optional integer field, accepting numeric strings (`"3"`)
    pub fn get_optional_i64(obj: &JsonValue, field: &str) -> Result<Option<i64>> {
        match obj.get(field) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => Self::to_i64(value, field).map(Some),
        }
    }

    /// Convert a number or numeric string to an integer
    pub fn to_i64(value: &JsonValue, field: &str) -> Result<i64> {
        match value {
            JsonValue::Number(n) => n.as_i64().ok_or_else(|| ParseError::InvalidValue {
                field: field.to_string(),
                message: format!("expected an integer, got {}", n),
            }),
            JsonValue::String(s) => s.trim().parse().map_err(|_| ParseError::InvalidValue {
                field: field.to_string(),
                message: format!("expected an integer, got '{}'", s),
            }),
            other => Err(ParseError::TypeMismatch {
                field: field.to_string(),
                expected: "integer".to_string(),
                actual: Self::type_name(other).to_string(),
            }),
        }
    }

    /// Get a list of strings (a single string counts as a one-element list)
    pub fn get_string_list(obj: &JsonValue, field: &str) -> Result<Vec<String>> {
        match obj.get(field) {
            None | Some(JsonValue::Null) => Ok(Vec::new()),
            Some(JsonValue::String(s)) => Ok(vec![s.clone()]),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ParseError::TypeMismatch {
                            field: field.to_string(),
                            expected: "string".to_string(),
                            actual: Self::type_name(item).to_string(),
                        })
                })
                .collect(),
            Some(other) => Err(ParseError::TypeMismatch {
                field: field.to_string(),
                expected: "array of strings".to_string(),
                actual: Self::type_name(other).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_key() {
        let value = json!({"unit": {"layer": "Token"}});
        let (key, body) = JsonParser::single_key(&value, "query").unwrap();
        assert_eq!(key, "unit");
        assert_eq!(body["layer"], "Token");

        let two = json!({"unit": {}, "sequence": {}});
        assert!(matches!(
            JsonParser::single_key(&two, "query"),
            Err(ParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_numeric_strings() {
        let value = json!({"min": "2", "max": 5, "bad": "x"});
        assert_eq!(JsonParser::get_optional_i64(&value, "min").unwrap(), Some(2));
        assert_eq!(JsonParser::get_optional_i64(&value, "max").unwrap(), Some(5));
        assert_eq!(JsonParser::get_optional_i64(&value, "none").unwrap(), None);
        assert!(JsonParser::get_optional_i64(&value, "bad").is_err());
    }

    #[test]
    fn test_string_list() {
        let value = json!({"one": "t", "many": ["t", "s"]});
        assert_eq!(JsonParser::get_string_list(&value, "one").unwrap(), vec!["t"]);
        assert_eq!(JsonParser::get_string_list(&value, "many").unwrap().len(), 2);
        assert!(JsonParser::get_string_list(&value, "absent").unwrap().is_empty());
    }
}
