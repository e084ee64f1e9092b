//! JSON schema subset used to validate manifest contributions.
//!
//! Supported keywords: `type` (single or list), `enum`, `properties`,
//! `required`, `additionalProperties` (bool or schema), `items`, `minItems`,
//! `minLength`, `pattern`, `anyOf`. Unknown keywords are ignored.
//!
//! # Invariants
//! - Validation stops at the first violation and reports its location as a
//!   `$`-rooted path (`$.menus["editor/title"][0].command`).
//! - Each distinct `pattern` is compiled once per process.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// First schema violation found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl Display for SchemaViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl Error for SchemaViolation {}

/// Validates `value` against `schema`.
pub fn validate(schema: &JsonValue, value: &JsonValue) -> Result<(), SchemaViolation> {
    validate_at(schema, value, "$")
}

fn validate_at(schema: &JsonValue, value: &JsonValue, path: &str) -> Result<(), SchemaViolation> {
    let schema = match schema {
        JsonValue::Bool(true) => return Ok(()),
        JsonValue::Bool(false) => return Err(SchemaViolation::new(path, "no value is allowed")),
        JsonValue::Object(schema) => schema,
        _ => return Ok(()),
    };

    if let Some(expected) = schema.get("type") {
        check_type(expected, value, path)?;
    }

    if let Some(JsonValue::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(value) {
            let listed = allowed
                .iter()
                .map(JsonValue::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(SchemaViolation::new(
                path,
                format!("must be one of {listed}"),
            ));
        }
    }

    if let Some(JsonValue::Array(options)) = schema.get("anyOf") {
        if !options
            .iter()
            .any(|option| validate_at(option, value, path).is_ok())
        {
            return Err(SchemaViolation::new(
                path,
                "does not match any allowed shape",
            ));
        }
    }

    match value {
        JsonValue::String(text) => check_string(schema, text, path)?,
        JsonValue::Array(items) => check_array(schema, items, path)?,
        JsonValue::Object(object) => check_object(schema, object, path)?,
        _ => {}
    }
    Ok(())
}

fn check_type(expected: &JsonValue, value: &JsonValue, path: &str) -> Result<(), SchemaViolation> {
    let names: Vec<&str> = match expected {
        JsonValue::String(name) => vec![name.as_str()],
        JsonValue::Array(names) => names.iter().filter_map(JsonValue::as_str).collect(),
        _ => return Ok(()),
    };
    if names.iter().any(|name| type_matches(name, value)) {
        return Ok(());
    }
    Err(SchemaViolation::new(
        path,
        format!("expected {}, found {}", names.join(" or "), json_type(value)),
    ))
}

fn type_matches(name: &str, value: &JsonValue) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn check_string(
    schema: &Map<String, JsonValue>,
    text: &str,
    path: &str,
) -> Result<(), SchemaViolation> {
    if let Some(min) = schema.get("minLength").and_then(JsonValue::as_u64) {
        if (text.chars().count() as u64) < min {
            return Err(SchemaViolation::new(
                path,
                format!("must be at least {min} characters long"),
            ));
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(JsonValue::as_str) {
        let regex = compiled_pattern(pattern).map_err(|err| {
            SchemaViolation::new(path, format!("schema pattern `{pattern}` is invalid: {err}"))
        })?;
        if !regex.is_match(text) {
            return Err(SchemaViolation::new(
                path,
                format!("does not match pattern `{pattern}`"),
            ));
        }
    }
    Ok(())
}

/// Cached compile of a `pattern` keyword. Invalid patterns are not cached.
fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERN_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

fn check_array(
    schema: &Map<String, JsonValue>,
    items: &[JsonValue],
    path: &str,
) -> Result<(), SchemaViolation> {
    if let Some(min) = schema.get("minItems").and_then(JsonValue::as_u64) {
        if (items.len() as u64) < min {
            return Err(SchemaViolation::new(
                path,
                format!("must contain at least {min} items"),
            ));
        }
    }
    if let Some(item_schema) = schema.get("items") {
        for (index, item) in items.iter().enumerate() {
            validate_at(item_schema, item, &format!("{path}[{index}]"))?;
        }
    }
    Ok(())
}

fn check_object(
    schema: &Map<String, JsonValue>,
    object: &Map<String, JsonValue>,
    path: &str,
) -> Result<(), SchemaViolation> {
    if let Some(JsonValue::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(JsonValue::as_str) {
            if !object.contains_key(key) {
                return Err(SchemaViolation::new(
                    path,
                    format!("missing required property '{key}'"),
                ));
            }
        }
    }

    let properties = schema.get("properties").and_then(JsonValue::as_object);
    let additional = schema.get("additionalProperties");
    for (key, value) in object {
        let child = child_path(path, key);
        if let Some(property_schema) = properties.and_then(|props| props.get(key)) {
            validate_at(property_schema, value, &child)?;
            continue;
        }
        match additional {
            Some(JsonValue::Bool(false)) => {
                return Err(SchemaViolation::new(
                    &child,
                    format!("property '{key}' is not allowed"),
                ));
            }
            Some(extra_schema @ JsonValue::Object(_)) => validate_at(extra_schema, value, &child)?,
            _ => {}
        }
    }
    Ok(())
}

fn child_path(path: &str, key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        format!("{path}.{key}")
    } else {
        format!("{path}[{key:?}]")
    }
}

#[cfg(test)]
mod tests {
    use super::{validate, PATTERN_CACHE};
    use serde_json::json;

    fn command_schema() -> serde_json::Value {
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["command", "title"],
                "properties": {
                    "command": { "type": "string", "minLength": 1 },
                    "title": { "type": "string" }
                },
                "additionalProperties": false
            }
        })
    }

    #[test]
    fn accepts_matching_document() {
        let value = json!([{ "command": "x.run", "title": "Run" }]);
        assert!(validate(&command_schema(), &value).is_ok());
    }

    #[test]
    fn reports_first_violation_path() {
        let value = json!([{ "command": "x.run", "title": "Run" }, { "command": "y" }]);
        let violation = validate(&command_schema(), &value).expect_err("title is missing");
        assert_eq!(violation.path, "$[1]");
        assert!(violation.message.contains("'title'"));
    }

    #[test]
    fn rejects_wrong_type_and_extra_properties() {
        let violation = validate(&command_schema(), &json!({ "command": "x" }))
            .expect_err("object is not an array");
        assert_eq!(violation.path, "$");
        assert_eq!(violation.message, "expected array, found object");

        let value = json!([{ "command": "x", "title": "X", "extra": true }]);
        let violation = validate(&command_schema(), &value).expect_err("extra is not allowed");
        assert_eq!(violation.path, "$[0].extra");
    }

    #[test]
    fn validates_keyed_maps_through_additional_properties() {
        let schema = json!({
            "type": "object",
            "additionalProperties": {
                "type": "array",
                "items": { "type": "string", "pattern": "^[a-z]+$" }
            }
        });
        assert!(validate(&schema, &json!({ "editor/title": ["ok"] })).is_ok());
        let violation = validate(&schema, &json!({ "editor/title": ["Bad"] }))
            .expect_err("pattern mismatch");
        assert_eq!(violation.path, "$[\"editor/title\"][0]");
    }

    #[test]
    fn supports_enum_any_of_and_type_lists() {
        let schema = json!({
            "anyOf": [
                { "type": "string", "enum": ["left", "right"] },
                { "type": ["integer", "null"] }
            ]
        });
        assert!(validate(&schema, &json!("left")).is_ok());
        assert!(validate(&schema, &json!(3)).is_ok());
        assert!(validate(&schema, &json!(null)).is_ok());
        assert!(validate(&schema, &json!("up")).is_err());
        assert!(validate(&schema, &json!(1.5)).is_err());
    }

    #[test]
    fn enforces_min_items_and_min_length() {
        let schema = json!({ "type": "array", "minItems": 1, "items": { "minLength": 2 } });
        assert!(validate(&schema, &json!([])).is_err());
        assert!(validate(&schema, &json!(["a"])).is_err());
        assert!(validate(&schema, &json!(["ab"])).is_ok());
    }

    #[test]
    fn patterns_are_compiled_once_and_invalid_ones_reported() {
        let schema = json!({ "type": "string", "pattern": "^cached-[0-9]+$" });
        assert!(validate(&schema, &json!("cached-1")).is_ok());
        assert!(PATTERN_CACHE
            .lock()
            .expect("cache lock")
            .contains_key("^cached-[0-9]+$"));
        assert!(validate(&schema, &json!("cached-22")).is_ok());
        assert!(validate(&schema, &json!("cached-x")).is_err());

        let broken = json!({ "type": "string", "pattern": "([unclosed" });
        let violation = validate(&broken, &json!("anything")).expect_err("invalid pattern");
        assert!(violation.message.contains("is invalid"));
        assert!(!PATTERN_CACHE
            .lock()
            .expect("cache lock")
            .contains_key("([unclosed"));
    }
}
