use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::parse_timestamp;

/// An upstream payload exactly as the API returned it.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A replication cursor value.
///
/// Text values keep the exact string they were read from so that persisted
/// bookmarks round-trip byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorValue {
    Integer(i64),
    Text(String),
}

impl CursorValue {
    pub fn text(s: impl Into<String>) -> Self {
        CursorValue::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CursorValue::Text(s) => Some(s),
            CursorValue::Integer(_) => None,
        }
    }

    /// Order two cursor values.
    ///
    /// Timestamps compare as instants regardless of how the offset is spelled,
    /// integers numerically, other strings lexically. Mixed kinds are
    /// incomparable.
    pub fn compare(&self, other: &CursorValue) -> Option<Ordering> {
        match (self, other) {
            (CursorValue::Integer(a), CursorValue::Integer(b)) => Some(a.cmp(b)),
            (CursorValue::Text(a), CursorValue::Text(b)) => {
                match (parse_timestamp(a), parse_timestamp(b)) {
                    (Some(ta), Some(tb)) => Some(ta.cmp(&tb)),
                    (None, None) => Some(a.cmp(b)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// True when `self` is strictly after `other`.
    pub fn is_after(&self, other: &CursorValue) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    /// Read a cursor out of a JSON value. Null and non-scalar values yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(CursorValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(CursorValue::Integer),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CursorValue::Integer(i) => serde_json::Value::Number((*i).into()),
            CursorValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorValue::Integer(i) => write!(f, "{}", i),
            CursorValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CursorValue {
    fn from(s: &str) -> Self {
        CursorValue::Text(s.to_string())
    }
}

impl From<String> for CursorValue {
    fn from(s: String) -> Self {
        CursorValue::Text(s)
    }
}

impl From<i64> for CursorValue {
    fn from(i: i64) -> Self {
        CursorValue::Integer(i)
    }
}

/// A record reshaped to its stream's declared schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Name of the stream the record belongs to.
    pub stream: String,
    /// Schema-conformant field values.
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Replication position of this record; `None` when the upstream payload
    /// carried no usable cursor.
    pub cursor: Option<CursorValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_cursors_compare_as_instants() {
        let z = CursorValue::text("2024-01-01T00:00:00Z");
        let offset = CursorValue::text("2024-01-01T00:00:00+00:00");
        let later = CursorValue::text("2024-01-01T00:00:01+00:00");

        assert_eq!(z.compare(&offset), Some(Ordering::Equal));
        assert!(later.is_after(&z));
        assert!(!z.is_after(&later));
        assert!(!z.is_after(&offset));
    }

    #[test]
    fn test_integer_and_plain_text_cursors() {
        assert!(CursorValue::Integer(10).is_after(&CursorValue::Integer(9)));
        assert!(CursorValue::text("b").is_after(&CursorValue::text("a")));
        assert_eq!(
            CursorValue::Integer(1).compare(&CursorValue::text("2024-01-01")),
            None
        );
        assert_eq!(
            CursorValue::text("abc").compare(&CursorValue::text("2024-01-01")),
            None
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            CursorValue::from_json(&json!("2024-01-01T00:00:00Z")),
            Some(CursorValue::text("2024-01-01T00:00:00Z"))
        );
        assert_eq!(CursorValue::from_json(&json!(42)), Some(CursorValue::Integer(42)));
        assert_eq!(CursorValue::from_json(&json!(null)), None);
        assert_eq!(CursorValue::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn test_cursor_serde_keeps_exact_text() {
        let cursor = CursorValue::text("2024-03-05T10:11:12.123456+00:00");
        let json = serde_json::to_string(&cursor).unwrap();
        let back: CursorValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cursor);

        let back: CursorValue = serde_json::from_str("17").unwrap();
        assert_eq!(back, CursorValue::Integer(17));
    }
}
