use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A model value, or the result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
    Record(Record),
}

/// A named value with ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Record {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

impl Value {
    /// Resolve one path segment against this value.
    ///
    /// Tried in order: record field, mapping key, sequence index, then the
    /// built-in `Count`/`Length` property of sequences, mappings and text.
    pub fn member(&self, segment: &str) -> Option<Cow<'_, Value>> {
        let found = match self {
            Value::Record(record) => record.field(segment),
            Value::Mapping(map) => map.get(segment),
            Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        if let Some(value) = found {
            return Some(Cow::Borrowed(value));
        }

        if segment == "Count" || segment == "Length" {
            let len = match self {
                Value::Sequence(items) => items.len(),
                Value::Mapping(map) => map.len(),
                Value::Text(text) => text.chars().count(),
                _ => return None,
            };
            return Some(Cow::Owned(Value::Integer(len as i64)));
        }

        None
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Sequence(items) => !items.is_empty(),
            Value::Mapping(map) => !map.is_empty(),
            Value::DateTime(_) | Value::Record(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Text(_) => "Text",
            Value::DateTime(_) => "DateTime",
            Value::Sequence(_) => "Sequence",
            Value::Mapping(_) => "Mapping",
            Value::Record(_) => "Record",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// A number result, narrowed to an integer when it is whole.
    pub fn number(n: f64) -> Value {
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
        if n == n.trunc() && (i64::MIN as f64..i64::MAX as f64).contains(&n) {
            Value::Integer(n as i64)
        } else {
            Value::Float(n)
        }
    }
}

/// Parse the date and time forms accepted in models and function arguments.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Mapping(map) => {
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                Ok(())
            }
            Value::Record(record) => write!(f, "{}", record.name),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
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

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::Text(s),
            toml::Value::Integer(n) => Value::Integer(n),
            toml::Value::Float(n) => Value::Float(n),
            toml::Value::Boolean(b) => Value::Boolean(b),
            toml::Value::Datetime(dt) => {
                let text = dt.to_string();
                parse_datetime(&text).map_or(Value::Text(text), Value::DateTime)
            }
            toml::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            toml::Value::Table(table) => Value::Mapping(
                table
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Value {
        Record::new("Order")
            .with_field("Id", 7)
            .with_field("Lines", vec!["a", "b"])
            .into()
    }

    #[test]
    fn member_resolution_order() {
        let order = order();
        assert_eq!(order.member("Id").as_deref(), Some(&Value::Integer(7)));
        let lines = order.member("Lines").map(Cow::into_owned).unwrap();
        assert_eq!(lines.member("1").as_deref(), Some(&Value::from("b")));
        assert_eq!(lines.member("Count").as_deref(), Some(&Value::Integer(2)));
        assert!(lines.member("2").is_none());
        assert!(order.member("Missing").is_none());
    }

    #[test]
    fn mapping_key_shadows_count() {
        let json: Value = serde_json::json!({ "Count": "many" }).into();
        assert_eq!(json.member("Count").as_deref(), Some(&Value::from("many")));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::from(vec![1, 2, 3]).to_string(), "1, 2, 3");
        let dt = parse_datetime("2024-01-01T01:30:00").unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2024-01-01T01:30:00");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Sequence(Vec::new()).is_truthy());
        assert!(Value::Integer(3).is_truthy());
        assert!(order().is_truthy());
    }

    #[test]
    fn from_json() {
        let value: Value = serde_json::json!({ "n": 1, "f": 1.5, "xs": [true, null] }).into();
        assert_eq!(value.member("n").as_deref(), Some(&Value::Integer(1)));
        assert_eq!(value.member("f").as_deref(), Some(&Value::Float(1.5)));
        assert_eq!(
            value.member("xs").as_deref(),
            Some(&Value::Sequence(vec![Value::Boolean(true), Value::Null]))
        );
    }

    #[test]
    fn from_toml_datetime() {
        let table: toml::Table = toml::from_str("when = 2024-01-01T00:00:00").unwrap();
        let value = Value::from(toml::Value::Table(table));
        assert_eq!(
            value.member("when").as_deref(),
            Some(&Value::DateTime(parse_datetime("2024-01-01").unwrap()))
        );
    }

    #[test]
    fn whole_numbers_narrow() {
        assert_eq!(Value::number(5.0), Value::Integer(5));
        assert_eq!(Value::number(0.5), Value::Float(0.5));
        assert_eq!(Value::number(1e16), Value::Integer(10_000_000_000_000_000));
        assert_eq!(Value::number(-9.0e18), Value::Integer(-9_000_000_000_000_000_000));
        assert_eq!(Value::number(1e19), Value::Float(1e19));
    }
}
