// Measurement domain model and value coercion
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observation: a numeric value for a tag at a point in time.
///
/// `created_at` always carries an explicit timezone; naive input timestamps
/// are tagged UTC at construction and never left ambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub measurement: String,
    pub created_at: DateTime<Utc>,
}

impl Measurement {
    pub fn new(value: f64, measurement: String, created_at: DateTime<Utc>) -> Self {
        Self {
            value,
            measurement,
            created_at,
        }
    }
}

/// The accepted shapes of a submitted value, decoded explicitly rather than
/// coerced dynamically. Anything else (bool, null, array, object) is rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    pub fn from_json(raw: &Value) -> Option<RawValue> {
        match raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(RawValue::Integer(i))
                } else {
                    n.as_f64().map(RawValue::Float)
                }
            }
            Value::String(s) => Some(RawValue::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert to a finite f64. Text must parse as a decimal number;
    /// non-finite results ("inf", "NaN") are rejected.
    pub fn as_float(&self) -> Option<f64> {
        let value = match self {
            RawValue::Integer(i) => *i as f64,
            RawValue::Float(f) => *f,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Parse a submitted timestamp. Accepts RFC 3339 with offset, a naive
/// datetime (assumed UTC), or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    raw.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}
