//! Row and value types shared by the parser, executor and storage layers

mod table;

pub use table::{ColumnDef, TableDescriptor};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A row is a flat record of named values. Nested objects are allowed and
/// reachable through dot-path column names (`a.b.c`).
pub type Row = BTreeMap<String, Value>;

/// Closed value type for everything a row can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Array(Vec<Value>),
    Object(Row),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Row> {
        match self {
            Value::Object(row) => Some(row),
            _ => None,
        }
    }

    /// Integer view, accepting integral floats
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric coercion: numbers as-is, booleans as 0/1, text parsed.
    /// Returns `None` where the coercion yields no number.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Falsy values: null, false, zero, NaN and the empty string
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Integer(i) => *i == 0,
            Value::Float(f) => *f == 0.0 || f.is_nan(),
            Value::Text(s) => s.is_empty(),
            Value::Array(_) | Value::Object(_) => false,
        }
    }

    /// `==` semantics: no coercion across types, except integer/float.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.to_f64() == other.to_f64()
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).map_or(false, |w| v.strict_eq(w)))
            }
            _ => self == other,
        }
    }

    /// `=` semantics: numbers compare against parsed text, booleans compare
    /// as 0/1, null only equals null.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                self.strict_eq(other)
            }
            _ => match (self.to_f64(), other.to_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Whether some value of a different strict class is loosely equal to
    /// this one. Only non-numeric text is free of loose aliases.
    pub fn has_loose_aliases(&self) -> bool {
        match self {
            Value::Text(s) => parse_number(s).is_some(),
            _ => true,
        }
    }

    /// Text used for group keys and LIKE/INCLUDES matching
    pub fn to_key_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => self.to_string(),
        }
    }

    /// Resolve a dot-path (`a.b.c`) inside this value.
    /// `None` means some segment is missing.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Resolve a (possibly dotted) column against a row.
pub fn resolve_path<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    match column.split_once('.') {
        None => row.get(column),
        Some((head, rest)) => row.get(head)?.get_path(rest),
    }
}

pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| !f.is_nan())
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json: serde_json::Value = self.clone().into();
        write!(f, "{}", json)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Integer(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s),
            Value::Array(items) => serde_json::Value::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(row) => {
                serde_json::Value::Object(row.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Row> for Value {
    fn from(row: Row) -> Self {
        Value::Object(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(json: serde_json::Value) -> Row {
        match Value::from(json) {
            Value::Object(row) => row,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert!(Value::Integer(30).loose_eq(&Value::Text("30".into())));
        assert!(!Value::Integer(30).strict_eq(&Value::Text("30".into())));
        assert!(Value::Integer(1).strict_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Integer(1)));
        assert!(!Value::Null.loose_eq(&Value::Integer(0)));
        assert!(Value::Null.loose_eq(&Value::Null));
        assert!(!Value::Text("abc".into()).loose_eq(&Value::Integer(0)));
    }

    #[test]
    fn test_loose_aliases() {
        assert!(!Value::Text("Ann".into()).has_loose_aliases());
        assert!(Value::Text("42".into()).has_loose_aliases());
        assert!(Value::Integer(42).has_loose_aliases());
        assert!(Value::Bool(false).has_loose_aliases());
    }

    #[test]
    fn test_falsy() {
        assert!(Value::Integer(0).is_falsy());
        assert!(Value::Text(String::new()).is_falsy());
        assert!(Value::Null.is_falsy());
        assert!(!Value::Integer(3).is_falsy());
        assert!(!Value::Array(vec![]).is_falsy());
    }

    #[test]
    fn test_resolve_dot_path() {
        let r = row(json!({"a": {"b": {"c": 5}}, "tags": ["x", "y"]}));
        assert_eq!(resolve_path(&r, "a.b.c"), Some(&Value::Integer(5)));
        assert_eq!(resolve_path(&r, "tags.1"), Some(&Value::Text("y".into())));
        assert_eq!(resolve_path(&r, "a.x.c"), None);
        assert_eq!(resolve_path(&r, "missing"), None);
    }

    #[test]
    fn test_json_conversion() {
        let value = Value::from(json!({"n": 1, "f": 1.5, "s": "x", "l": [null, true]}));
        let back: serde_json::Value = value.clone().into();
        assert_eq!(back, json!({"n": 1, "f": 1.5, "s": "x", "l": [null, true]}));

        let parsed: Value = serde_json::from_str(r#"{"age": 30, "score": 2.5}"#).unwrap();
        assert_eq!(parsed, value_of(json!({"age": 30, "score": 2.5})));
    }

    fn value_of(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_key_string() {
        assert_eq!(Value::Float(3.0).to_key_string(), "3");
        assert_eq!(Value::Float(2.5).to_key_string(), "2.5");
        assert_eq!(Value::Text("a".into()).to_key_string(), "a");
        assert_eq!(Value::Null.to_key_string(), "null");
    }
}
