//! Schema-driven normalization of upstream payloads.
//!
//! Normalization is a pure function of the raw record: fields the schema does
//! not declare are dropped, date-time fields are rendered as ISO-8601 UTC
//! strings whatever their upstream encoding, and scalar type mismatches are
//! reported as schema violations.

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::schema::{Property, Schema, SchemaType};
use crate::time::{format_timestamp, from_epoch_seconds, from_epoch_seconds_f64, parse_timestamp};

/// Coerce an upstream timestamp encoding into an ISO-8601 UTC string.
///
/// Integers and floats are epoch seconds; strings must parse as ISO-8601.
/// Null yields `Ok(None)`.
pub fn coerce_timestamp(value: &Value) -> std::result::Result<Option<String>, String> {
    let ts = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => {
            let ts = match n.as_i64() {
                Some(secs) => from_epoch_seconds(secs),
                None => n.as_f64().and_then(from_epoch_seconds_f64),
            };
            ts.ok_or_else(|| format!("epoch value {} out of range", n))?
        }
        Value::String(s) => {
            parse_timestamp(s).ok_or_else(|| format!("'{}' is not an ISO-8601 timestamp", s))?
        }
        other => return Err(format!("expected timestamp, got {}", json_type_name(other))),
    };
    Ok(Some(format_timestamp(ts)))
}

/// Conform a raw object to a schema.
pub fn conform(stream: &str, schema: &Schema, raw: &Map<String, Value>) -> Result<Map<String, Value>> {
    conform_object(stream, schema.properties(), raw, "")
}

fn conform_object(
    stream: &str,
    properties: &[Property],
    raw: &Map<String, Value>,
    prefix: &str,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for property in properties {
        let Some(value) = raw.get(&property.name) else {
            continue;
        };
        let path = join_path(prefix, &property.name);
        out.insert(
            property.name.clone(),
            conform_value(stream, &property.kind, value, &path)?,
        );
    }
    Ok(out)
}

fn conform_value(stream: &str, kind: &SchemaType, value: &Value, path: &str) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = || Error::SchemaViolation {
        stream: stream.to_string(),
        field: path.to_string(),
        reason: format!(
            "expected {}, got {}",
            kind.type_name(),
            json_type_name(value)
        ),
    };

    match (kind, value) {
        (SchemaType::String, Value::String(_))
        | (SchemaType::Number, Value::Number(_))
        | (SchemaType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (SchemaType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(value.clone())
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(Value::Number(Number::from(f as i64)))
                    }
                    _ => Err(mismatch()),
                }
            }
        }
        (SchemaType::DateTime, _) => match coerce_timestamp(value) {
            Ok(Some(s)) => Ok(Value::String(s)),
            Ok(None) => Ok(Value::Null),
            Err(reason) => Err(Error::SchemaViolation {
                stream: stream.to_string(),
                field: path.to_string(),
                reason,
            }),
        },
        (SchemaType::Object(props), Value::Object(obj)) => {
            Ok(Value::Object(conform_object(stream, props, obj, path)?))
        }
        (SchemaType::Array(items), Value::Array(arr)) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| conform_value(stream, items, v, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Err(mismatch()),
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(vec![
            Property::new("id", SchemaType::String),
            Property::new("duration", SchemaType::Number),
            Property::new("count", SchemaType::Integer),
            Property::new("seen", SchemaType::Boolean),
            Property::new("at", SchemaType::DateTime),
            Property::new(
                "deal",
                SchemaType::object(vec![Property::new("close_date", SchemaType::DateTime)]),
            ),
            Property::new(
                "matches",
                SchemaType::array_of(SchemaType::object(vec![Property::new(
                    "num_matches",
                    SchemaType::Integer,
                )])),
            ),
        ])
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_coerce_timestamp() {
        assert_eq!(
            coerce_timestamp(&json!(1_700_000_000)).unwrap().as_deref(),
            Some("2023-11-14T22:13:20+00:00")
        );
        assert_eq!(
            coerce_timestamp(&json!("2023-11-14T23:13:20+01:00")).unwrap().as_deref(),
            Some("2023-11-14T22:13:20+00:00")
        );
        assert_eq!(coerce_timestamp(&json!(null)).unwrap(), None);
        assert!(coerce_timestamp(&json!("soon")).is_err());
        assert!(coerce_timestamp(&json!(true)).is_err());
    }

    #[test]
    fn test_conform_drops_undeclared_fields() {
        let out = conform(
            "s",
            &schema(),
            &raw(json!({
                "id": "1",
                "unknown": "x",
                "deal": {"close_date": null, "extra": 1},
                "matches": [{"num_matches": 2, "name": "pricing"}]
            })),
        )
        .unwrap();

        assert_eq!(
            Value::Object(out.clone()),
            json!({"id": "1", "deal": {"close_date": null}, "matches": [{"num_matches": 2}]})
        );
        assert!(schema().covers(&out));
    }

    #[test]
    fn test_conform_converts_nested_epoch_dates() {
        let out = conform(
            "s",
            &schema(),
            &raw(json!({"at": 1_700_000_000, "deal": {"close_date": 1_700_000_000}})),
        )
        .unwrap();
        assert_eq!(out["at"], json!("2023-11-14T22:13:20+00:00"));
        assert_eq!(out["deal"]["close_date"], json!("2023-11-14T22:13:20+00:00"));
    }

    #[test]
    fn test_conform_integer_accepts_whole_floats() {
        let out = conform("s", &schema(), &raw(json!({"count": 3.0}))).unwrap();
        assert_eq!(out["count"], json!(3));
        assert!(conform("s", &schema(), &raw(json!({"count": 3.5}))).is_err());
    }

    #[test]
    fn test_conform_reports_path_of_mismatch() {
        let err = conform(
            "emails",
            &schema(),
            &raw(json!({"matches": [{"num_matches": 1}, {"num_matches": "two"}]})),
        )
        .unwrap_err();

        match err {
            Error::SchemaViolation { stream, field, .. } => {
                assert_eq!(stream, "emails");
                assert_eq!(field, "matches[1].num_matches");
            }
            other => panic!("Expected SchemaViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_conform_is_deterministic() {
        let input = raw(json!({"id": "1", "at": 1_700_000_000, "seen": true, "duration": 12.5}));
        let a = conform("s", &schema(), &input).unwrap();
        let b = conform("s", &schema(), &input).unwrap();
        assert_eq!(a, b);
    }
}
