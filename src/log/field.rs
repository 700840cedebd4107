//! Field values attached to log entries.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The field set carried by an [`Entry`](super::Entry).
///
/// A `BTreeMap` so keys stay unique (last write wins) and render in a stable
/// order.
pub type Fields = BTreeMap<String, Value>;

/// A single structured field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s)      => f.write_str(s),
            Self::Int(n)      => write!(f, "{n}"),
            Self::Uint(n)     => write!(f, "{n}"),
            Self::Float(n)    => write!(f, "{n}"),
            Self::Bool(b)     => write!(f, "{b}"),
            // `Duration`'s Debug output is the human form: 50ms, 1.5s, 120µs.
            Self::Duration(d) => write!(f, "{d:?}"),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Str(s)      => s.as_str().into(),
            Value::Int(n)      => (*n).into(),
            Value::Uint(n)     => (*n).into(),
            // Non-finite floats become `null`.
            Value::Float(n)    => (*n).into(),
            Value::Bool(b)     => (*b).into(),
            Value::Duration(_) => value.to_string().into(),
        }
    }
}

/// Renders a field set as one compact JSON object.
///
/// Keys are arbitrary strings (`measure#my app.latency` is legal), so the
/// whole set travels as a single JSON value instead of one `tracing` field
/// per key.
pub(crate) struct FieldsJson<'a>(pub(crate) &'a Fields);

impl fmt::Display for FieldsJson<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map: serde_json::Map<String, serde_json::Value> =
            self.0.iter().map(|(k, v)| (k.clone(), v.into())).collect();
        write!(f, "{}", serde_json::Value::Object(map))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::Str(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::Str(s) }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self { Self::Str(s.clone()) }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self { Self::Int(n.into()) }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self { Self::Int(n) }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self { Self::Uint(n.into()) }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self { Self::Uint(n.into()) }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self { Self::Uint(n) }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self { Self::Uint(n as u64) }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self { Self::Float(n) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self { Self::Duration(d) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_durations() {
        assert_eq!(Value::from(Duration::from_millis(50)).to_string(), "50ms");
        assert_eq!(Value::from(Duration::from_millis(1500)).to_string(), "1.5s");
    }

    #[test]
    fn test_unsigned_conversions() {
        assert_eq!(Value::from(200u16), Value::Uint(200));
        assert_eq!(Value::from(7usize), Value::Uint(7));
    }

    #[test]
    fn test_json_keeps_types() {
        let mut fields = Fields::new();
        fields.insert("status".to_owned(), Value::from(200u16));
        fields.insert("took".to_owned(), Value::from(Duration::from_millis(50)));
        fields.insert("cached".to_owned(), Value::from(false));
        assert_eq!(
            FieldsJson(&fields).to_string(),
            r#"{"cached":false,"status":200,"took":"50ms"}"#
        );
    }

    #[test]
    fn test_json_escapes_keys() {
        let mut fields = Fields::new();
        fields.insert("measure#my app.latency".to_owned(), Value::from(7i64));
        fields.insert(r#"say "hi"=x"#.to_owned(), Value::from("ok"));
        let rendered = FieldsJson(&fields).to_string();

        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["measure#my app.latency"], 7);
        assert_eq!(parsed[r#"say "hi"=x"#], "ok");
    }

    #[test]
    fn test_last_write_wins() {
        let mut fields = Fields::new();
        fields.insert("k".to_owned(), Value::from("a"));
        fields.insert("k".to_owned(), Value::from("b"));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["k"], Value::from("b"));
    }
}
