//! Attribute value type matching the knowledge graph's literal types.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Literal value carried by an attribute instance.
///
/// Covers the value types a TypeQL attribute can declare:
/// - Numbers: Long, Double
/// - Boolean
/// - String
/// - DateTime (naive, second or sub-second precision)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Long(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    DateTime(NaiveDateTime),
}

/// Declared value type of an attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Long,
    Double,
    Boolean,
    String,
    DateTime,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Long => "long",
            ValueType::Double => "double",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
            ValueType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::Boolean(_) => ValueType::Boolean,
            Value::String(_) => ValueType::String,
            Value::DateTime(_) => ValueType::DateTime,
        }
    }

    pub fn is_numeric(&self) -> bool { matches!(self, Value::Long(_) | Value::Double(_)) }
    pub fn is_string(&self) -> bool { matches!(self, Value::String(_)) }

    /// Attempt to extract as i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(i) => Some(*i),
            Value::Double(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Attempt to extract as f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Long(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Attempt to extract as &str
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain rendering without literal quoting, as shown to an operator.
    pub fn to_plain(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Value equality across numeric kinds (`Long(2) == Double(2.0)`).
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Long(a), Value::Double(b)) | (Value::Double(b), Value::Long(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Boolean(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Long(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Long(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Double(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<NaiveDateTime> for Value { fn from(v: NaiveDateTime) -> Self { Value::DateTime(v) } }

// ============================================================================
// Display (TypeQL literal)
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(i) => write!(f, "{i}"),
            Value::Double(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("valve"), Value::String("valve".into()));
        assert_eq!(Value::from(42), Value::Long(42));
        assert_eq!(Value::from(3.14), Value::Double(3.14));
        assert_eq!(Value::from(true), Value::Boolean(true));
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Value::from("MECH-01").to_string(), "\"MECH-01\"");
        assert_eq!(Value::from("say \"hi\"").to_string(), "\"say \\\"hi\\\"\"");
        assert_eq!(Value::Double(1250.0).to_string(), "1250.0");
        assert_eq!(Value::Double(-22.5).to_string(), "-22.5");
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(6, 30, 0).unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2024-01-01T06:30:00");
    }

    #[test]
    fn test_plain_rendering_drops_quotes() {
        assert_eq!(Value::from("MECH-01").to_plain(), "MECH-01");
        assert_eq!(Value::Long(7).to_plain(), "7");
    }

    #[test]
    fn test_loose_numeric_equality() {
        assert!(Value::Long(2).loosely_equals(&Value::Double(2.0)));
        assert!(!Value::Long(2).loosely_equals(&Value::String("2".into())));
    }
}
