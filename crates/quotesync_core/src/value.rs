//! Dynamic field values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The value of a quote field or job parameter.
///
/// Floats are intentionally not supported: money and quantities are carried
/// as integer minor units so that equality and encoding are exact.
/// Comparison is structural, and the derived total order is used only as a
/// last-resort deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// No value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (minor units for money).
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Ordered list of values.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    /// Returns true if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Returns the integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Integer(i64::from(n))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = FieldValue::from(vec!["x", "y"]);
        let b = FieldValue::List(vec![FieldValue::text("x"), FieldValue::text("y")]);
        assert_eq!(a, b);
        assert_ne!(FieldValue::Integer(0), FieldValue::Null);
        assert_ne!(FieldValue::text("1"), FieldValue::Integer(1));
    }

    #[test]
    fn json_shape_is_natural() {
        let v: FieldValue = serde_json::from_str(r#"[1, "a", null, true]"#).unwrap();
        assert_eq!(
            v,
            FieldValue::List(vec![
                FieldValue::Integer(1),
                FieldValue::text("a"),
                FieldValue::Null,
                FieldValue::Bool(true),
            ])
        );
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"[1,"a",null,true]"#);
    }

    #[test]
    fn floats_are_rejected() {
        let v: Result<FieldValue, _> = serde_json::from_str("1.5");
        assert!(v.is_err());
    }

    #[test]
    fn display() {
        assert_eq!(FieldValue::text("ok").to_string(), "\"ok\"");
        assert_eq!(FieldValue::from(vec![1i64, 2]).to_string(), "[1, 2]");
        assert_eq!(FieldValue::Null.type_name(), "null");
    }
}
