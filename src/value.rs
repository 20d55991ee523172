/// Loosely-typed scalar handed over by a data accessor
///
/// This is the only shape in which raw input reaches classification and
/// column filling. Anything that is not a scalar (nested arrays, objects)
/// arrives as `Other` carrying its textual form.

use crate::date::{date_to_millis, datetime_to_millis, format_date};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Other(String),
}

impl InputValue {
    pub fn is_null(&self) -> bool {
        matches!(self, InputValue::Null)
    }

    /// Numeric coercion. Booleans count as 1/0 and numeric strings parse;
    /// everything else is not a number.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            InputValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            InputValue::Int(i) => Some(*i as f64),
            InputValue::Float(f) => Some(*f),
            InputValue::Str(s) => s.trim().parse::<f64>().ok(),
            InputValue::Null | InputValue::Date(_) | InputValue::DateTime(_) | InputValue::Other(_) => None,
        }
    }

    /// Boolean coercion: booleans, and the strings "true"/"false" in any case.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            InputValue::Bool(b) => Some(*b),
            InputValue::Str(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Epoch milliseconds for date-like values.
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            InputValue::DateTime(dt) => Some(datetime_to_millis(*dt)),
            InputValue::Date(d) => Some(date_to_millis(*d)),
            _ => None,
        }
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Canonical string form used when a value lands in a STRING column.
impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Null => Ok(()),
            InputValue::Bool(b) => write!(f, "{}", b),
            InputValue::Int(i) => write!(f, "{}", i),
            InputValue::Float(x) => write!(f, "{}", x),
            InputValue::Str(s) | InputValue::Other(s) => f.write_str(s),
            InputValue::Date(d) => f.write_str(&format_date(*d)),
            InputValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3f")),
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => InputValue::Null,
            Value::Bool(b) => InputValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => InputValue::Int(i),
                None => InputValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => InputValue::Str(s),
            other => InputValue::Other(other.to_string()),
        }
    }
}

impl From<bool> for InputValue {
    fn from(b: bool) -> Self {
        InputValue::Bool(b)
    }
}

impl From<i64> for InputValue {
    fn from(i: i64) -> Self {
        InputValue::Int(i)
    }
}

impl From<f64> for InputValue {
    fn from(x: f64) -> Self {
        InputValue::Float(x)
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Str(s.to_string())
    }
}

impl From<NaiveDate> for InputValue {
    fn from(d: NaiveDate) -> Self {
        InputValue::Date(d)
    }
}

impl From<NaiveDateTime> for InputValue {
    fn from(dt: NaiveDateTime) -> Self {
        InputValue::DateTime(dt)
    }
}

impl<T: Into<InputValue>> From<Option<T>> for InputValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(InputValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(InputValue::from(json!(null)), InputValue::Null);
        assert_eq!(InputValue::from(json!(3)), InputValue::Int(3));
        assert_eq!(InputValue::from(json!(2.5)), InputValue::Float(2.5));
        assert_eq!(InputValue::from(json!(u64::MAX)), InputValue::Float(u64::MAX as f64));
        assert_eq!(InputValue::from(json!("x")), InputValue::Str("x".into()));
        assert_eq!(InputValue::from(json!([1, 2])), InputValue::Other("[1,2]".into()));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(InputValue::Int(7).to_f64(), Some(7.0));
        assert_eq!(InputValue::Bool(true).to_f64(), Some(1.0));
        assert_eq!(InputValue::from(" 12.5 ").to_f64(), Some(12.5));
        assert_eq!(InputValue::from("abc").to_f64(), None);
        assert_eq!(InputValue::Null.to_f64(), None);
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(InputValue::from("FALSE").to_bool(), Some(false));
        assert_eq!(InputValue::from("True").to_bool(), Some(true));
        assert_eq!(InputValue::from("yes").to_bool(), None);
        assert_eq!(InputValue::Int(1).to_bool(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(InputValue::Float(99999.0).to_string(), "99999");
        assert_eq!(InputValue::Int(-4).to_string(), "-4");
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(InputValue::Date(d).to_string(), "2024-01-31");
        assert_eq!(InputValue::from(None::<i64>), InputValue::Null);
    }
}
