//! Dynamic values seen by when-clause evaluation.
//!
//! # Responsibility
//! - Represent the ambient context map handed to predicates.
//! - Implement the permissive coercion rules clauses rely on.
//!
//! # Invariants
//! - `==`/`!=` use loose (abstract) equality, never strict equality.
//! - Numbers are IEEE-754 doubles; string/number comparisons coerce.

use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Host function callable from a clause (`name(arg, ...)`).
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Context map consumed by compiled predicates.
pub type ContextMap = BTreeMap<String, Value>;

/// One dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Function(NativeFunction),
}

impl Value {
    /// Wraps a host closure as a callable value.
    pub fn function(
        f: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self::Function(Arc::new(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::String(value) => !value.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) => true,
        }
    }

    /// Numeric coercion (`+value`).
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(value) => {
                if *value {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(value) => *value,
            Self::String(value) => string_to_number(value),
            Self::Array(_) => string_to_number(&self.to_display_string()),
            Self::Object(_) | Self::Function(_) => f64::NAN,
        }
    }

    /// String coercion (`'' + value`).
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => number_to_string(*value),
            Self::String(value) => value.clone(),
            Self::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
            Self::Function(_) => "function".to_string(),
        }
    }

    /// Loose equality.
    ///
    /// Arrays and objects are owned values with no identity, so two of them
    /// are equal when their elements are strictly equal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_eq(vb))
            }
            (Self::Number(a), Self::String(_)) => *a == other.to_number(),
            (Self::String(_), Self::Number(b)) => self.to_number() == *b,
            (Self::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Self::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            (
                Self::Array(_) | Self::Object(_) | Self::Function(_),
                Self::Number(_) | Self::String(_),
            ) => Value::String(self.to_display_string()).loose_eq(other),
            (
                Self::Number(_) | Self::String(_),
                Self::Array(_) | Self::Object(_) | Self::Function(_),
            ) => self.loose_eq(&Value::String(other.to_display_string())),
            _ => false,
        }
    }

    /// Structural equality without coercion.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_eq(vb))
            }
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Relational comparison. `None` when either side coerces to NaN.
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        let left = self.to_primitive();
        let right = other.to_primitive();
        if let (Self::String(a), Self::String(b)) = (&left, &right) {
            return Some(a.cmp(b));
        }
        left.to_number().partial_cmp(&right.to_number())
    }

    /// Collapses arrays/objects into their string form; primitives pass through.
    pub fn to_primitive(&self) -> Value {
        match self {
            Self::Array(_) | Self::Object(_) | Self::Function(_) => {
                Self::String(self.to_display_string())
            }
            other => other.clone(),
        }
    }
}

fn string_to_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(|value| value as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf"/"nan" spellings that must stay NaN here.
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Number(value) => f.debug_tuple("Number").field(value).finish(),
            Self::String(value) => f.debug_tuple("String").field(value).finish(),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Object(map) => f.debug_tuple("Object").field(map).finish(),
            Self::Function(_) => write!(f, "Function(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Undefined)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self::Object(value)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(value: HashMap<String, Value>) -> Self {
        Self::Object(value.into_iter().collect())
    }
}

/// Sets become arrays so `x in set` keeps membership semantics.
impl From<HashSet<String>> for Value {
    fn from(value: HashSet<String>) -> Self {
        let mut items: Vec<String> = value.into_iter().collect();
        items.sort();
        Self::Array(items.into_iter().map(Self::String).collect())
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(value: BTreeSet<String>) -> Self {
        Self::Array(value.into_iter().map(Self::String).collect())
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(value),
            JsonValue::Number(value) => Self::Number(value.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(value) => Self::String(value),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Into::into).collect()),
            JsonValue::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Builds a context map from a JSON object; non-object input yields an empty map.
pub fn context_from_json(value: JsonValue) -> ContextMap {
    match value {
        JsonValue::Object(map) => map.into_iter().map(|(k, v)| (k, v.into())).collect(),
        _ => ContextMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::Value;
    use serde_json::json;
    use std::cmp::Ordering;

    #[test]
    fn loose_equality_coerces_numbers_and_strings() {
        assert!(Value::from(1).loose_eq(&Value::from("1")));
        assert!(Value::from("1.0").loose_eq(&Value::from(1)));
        assert!(Value::from(true).loose_eq(&Value::from(1)));
        assert!(Value::from(false).loose_eq(&Value::from("")));
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&Value::from(0)));
        assert!(!Value::from("abc").loose_eq(&Value::from(0)));
    }

    #[test]
    fn arrays_compare_by_string_form_against_primitives() {
        let list = Value::from(vec![1, 2]);
        assert!(list.loose_eq(&Value::from("1,2")));
        assert!(Value::from(vec![7]).loose_eq(&Value::from(7)));
    }

    #[test]
    fn nan_is_never_equal_or_ordered() {
        let nan = Value::Number(f64::NAN);
        assert!(!nan.loose_eq(&nan));
        assert_eq!(nan.loose_cmp(&Value::from(1)), None);
        assert!(Value::from("abc").to_number().is_nan());
        assert!(Value::from("inf").to_number().is_nan());
    }

    #[test]
    fn string_ordering_is_lexicographic_only_when_both_are_strings() {
        assert_eq!(
            Value::from("10").loose_cmp(&Value::from("9")),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::from("10").loose_cmp(&Value::from(9)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn display_string_matches_script_conventions() {
        assert_eq!(Value::from(3.0).to_display_string(), "3");
        assert_eq!(Value::Number(-0.0).to_display_string(), "0");
        assert_eq!(Value::Number(f64::INFINITY).to_display_string(), "Infinity");
        assert_eq!(Value::Undefined.to_display_string(), "undefined");
        assert_eq!(
            Value::Array(vec![Value::Null, Value::from("a")]).to_display_string(),
            ",a"
        );
    }

    #[test]
    fn converts_json_values() {
        let value = Value::from(json!({"a": [1, "x", null], "b": true}));
        let Value::Object(map) = value else {
            panic!("object expected");
        };
        assert_eq!(
            map.get("a"),
            Some(&Value::Array(vec![
                Value::from(1),
                Value::from("x"),
                Value::Null
            ]))
        );
        assert_eq!(map.get("b"), Some(&Value::Bool(true)));
    }
}
