//! Declared value types for facts and the coercions between them

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Type a fact declares for its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "int", alias = "long")]
    Integer,
    #[serde(alias = "float", alias = "decimal", alias = "double")]
    Real,
    String,
    #[serde(alias = "datetime")]
    Date,
    /// No coercion
    #[default]
    Any,
}

impl ValueType {
    /// Convert `value` to this type. `null` always passes through.
    pub fn coerce(&self, value: Value) -> EngineResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            ValueType::Any => Ok(value),
            ValueType::Boolean => match &value {
                Value::Bool(_) => Ok(value),
                Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err(self.mismatch(&value)),
                },
                _ => Err(self.mismatch(&value)),
            },
            ValueType::Integer => match &value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
                Value::Number(n) => Ok(n
                    .as_f64()
                    .map(|f| Value::from(f.trunc() as i64))
                    .unwrap_or(Value::Null)),
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| s.trim().parse::<f64>().map(|f| Value::from(f.trunc() as i64)))
                    .map_err(|_| self.mismatch(&value)),
                _ => Err(self.mismatch(&value)),
            },
            ValueType::Real => match &value {
                Value::Number(n) => Ok(n.as_f64().map(Value::from).unwrap_or(Value::Null)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| self.mismatch(&value)),
                _ => Err(self.mismatch(&value)),
            },
            ValueType::String => match value {
                Value::String(_) => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Ok(Value::String(other.to_string())),
            },
            ValueType::Date => match parse_temporal(&value) {
                Some(moment) => Ok(Value::String(format_temporal(&moment))),
                None => Err(self.mismatch(&value)),
            },
        }
    }

    fn mismatch(&self, found: &Value) -> EngineError {
        EngineError::type_mismatch("fact coercion", self.to_string(), found)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Real => "real",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Any => "any",
        };
        f.write_str(label)
    }
}

/// Interpret a value as a point in time.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD` dates, `YYYY-MM-DDTHH:MM:SS`
/// local timestamps and Unix seconds.
pub fn parse_temporal(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc).naive_utc());
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(dt);
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

/// Canonical text form: a bare date at midnight, a full timestamp otherwise
pub fn format_temporal(moment: &NaiveDateTime) -> String {
    if moment.num_seconds_from_midnight() == 0 && moment.nanosecond() == 0 {
        moment.date().format("%Y-%m-%d").to_string()
    } else {
        moment.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}
