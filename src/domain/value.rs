//! Tag values as reported by the metadata service.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// A single tag value.
///
/// `Text("")` never exists: empty strings normalise to [`TagValue::Empty`],
/// which means "absent/cleared" throughout the engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TagValue {
    #[default]
    Empty,
    Text(String),
    List(Vec<String>),
    Number(f64),
}

impl TagValue {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            TagValue::Empty
        } else {
            TagValue::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TagValue::Empty => true,
            TagValue::Text(s) => s.is_empty(),
            TagValue::List(items) => items.is_empty(),
            TagValue::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Items of a keyword-style value; a scalar counts as one item.
    pub fn items(&self) -> Vec<String> {
        match self {
            TagValue::Empty => Vec::new(),
            TagValue::Text(s) => vec![s.clone()],
            TagValue::List(items) => items.clone(),
            TagValue::Number(n) => vec![n.to_string()],
        }
    }

    /// Flat string form. Lists are comma-joined, which is also how QuickTime
    /// stores keywords, so `["a", "b"]` and `"a,b"` compare equal.
    pub fn flat(&self) -> String {
        match self {
            TagValue::Empty => String::new(),
            TagValue::Text(s) => s.clone(),
            TagValue::List(items) => items.join(","),
            TagValue::Number(n) => n.to_string(),
        }
    }

    /// Strict agreement used when merging duplicates.
    pub fn agrees_with(&self, other: &TagValue) -> bool {
        self.flat() == other.flat()
    }

    /// Type-tolerant equality used by the diff engine: trimmed string forms
    /// match, or both sides are the same sequence of numbers.
    pub fn loosely_equals(&self, other: &TagValue) -> bool {
        if self.flat().trim() == other.flat().trim() {
            return true;
        }
        match (self.numbers(), other.numbers()) {
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-9)
            }
            _ => false,
        }
    }

    fn numbers(&self) -> Option<Vec<f64>> {
        let tokens: Vec<String> = match self {
            TagValue::Empty => return None,
            TagValue::Number(n) => return Some(vec![*n]),
            TagValue::Text(s) => s
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            TagValue::List(items) => items.iter().map(|s| s.trim().to_string()).collect(),
        };
        if tokens.is_empty() {
            return None;
        }
        tokens.iter().map(|t| t.parse::<f64>().ok()).collect()
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => TagValue::Empty,
            Value::Bool(b) => TagValue::Text(b.to_string()),
            // Integers stay textual: identifiers routinely exceed f64 precision.
            Value::Number(n) if n.is_i64() || n.is_u64() => TagValue::Text(n.to_string()),
            Value::Number(n) => n.as_f64().map(TagValue::Number).unwrap_or_default(),
            Value::String(s) => TagValue::text(s.clone()),
            Value::Array(items) => TagValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::Object(_) => TagValue::Text(value.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TagValue::Empty => Value::String(String::new()),
            TagValue::Text(s) => Value::String(s.clone()),
            TagValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            TagValue::Number(n) => {
                serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
            }
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::List(items) => write!(f, "[{}]", items.join(", ")),
            other => f.write_str(&other.flat()),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::text(s)
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::text(s)
    }
}

impl From<f64> for TagValue {
    fn from(n: f64) -> Self {
        TagValue::Number(n)
    }
}

impl From<Vec<String>> for TagValue {
    fn from(items: Vec<String>) -> Self {
        TagValue::List(items)
    }
}

impl Serialize for TagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(TagValue::from_json(&Value::deserialize(deserializer)?))
    }
}
