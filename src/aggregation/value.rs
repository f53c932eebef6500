use serde::{Serialize, Deserialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use crate::aggregation::histogram::ApproximateHistogram;
use crate::core::error::{Error, Result};
use crate::core::types::FieldValue;

/// Aggregator state, finalized metric output and result cell, all in one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    Text(String),
    TextList(Vec<String>),
    Histogram(Box<ApproximateHistogram>),
    Quantiles(Quantiles),
    Map(BTreeMap<String, Value>),
}

/// Output of the `quantiles` post-aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantiles {
    pub probabilities: Vec<f64>,
    pub quantiles: Vec<f64>,
    pub min: f64,
    pub max: f64,
}

impl Value {
    /// Raw ingest value as seen by an aggregator
    pub fn from_field(field: &FieldValue) -> Value {
        match field {
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::List(values) => Value::TextList(values.clone()),
            FieldValue::Long(v) => Value::Long(*v),
            FieldValue::Double(v) => Value::Double(*v),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    /// Lenient numeric view used by sorting and having clauses
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            Value::Double(v) => Some(*v as i64),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|v| v as i64))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&ApproximateHistogram> {
        match self {
            Value::Histogram(h) => Some(h),
            _ => None,
        }
    }

    /// Strict numeric read of an aggregator input. `Ok(None)` means absent;
    /// text that is not a number is a schema mismatch.
    pub fn numeric_input(&self, metric: &str) -> Result<Option<f64>> {
        match self {
            Value::Null => Ok(None),
            Value::Long(v) => Ok(Some(*v as f64)),
            Value::Double(v) => Ok(Some(*v)),
            Value::Text(s) if s.trim().is_empty() => Ok(None),
            Value::Text(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
                Error::schema_mismatch(format!("Metric '{}' expects a number, got '{}'", metric, s))
            }),
            Value::TextList(values) if values.len() == 1 => {
                Value::Text(values[0].clone()).numeric_input(metric)
            }
            other => Err(Error::schema_mismatch(format!(
                "Metric '{}' expects a number, got {}",
                metric,
                other.type_name()
            ))),
        }
    }

    /// Integral counterpart of `numeric_input`; keeps i64 precision for longs.
    pub fn long_input(&self, metric: &str) -> Result<Option<i64>> {
        match self {
            Value::Long(v) => Ok(Some(*v)),
            Value::Text(s) if s.trim().parse::<i64>().is_ok() => Ok(s.trim().parse::<i64>().ok()),
            other => Ok(other.numeric_input(metric)?.map(|v| v as i64)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Text(_) => "string",
            Value::TextList(_) => "string[]",
            Value::Histogram(_) => "approximateHistogram",
            Value::Quantiles(_) => "quantiles",
            Value::Map(_) => "map",
        }
    }

    /// Total order: nulls first, then numbers, then strings, then everything else
    pub fn compare(&self, other: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Long(_) | Value::Double(_) => 1,
                Value::Text(_) => 2,
                Value::TextList(_) => 3,
                _ => 4,
            }
        }

        match (self, other) {
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::TextList(a), Value::TextList(b)) => a.cmp(b),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Long(v) => Json::from(*v),
            Value::Double(v) => serde_json::Number::from_f64(*v).map(Json::Number).unwrap_or(Json::Null),
            Value::Text(s) => Json::String(s.clone()),
            Value::TextList(values) => Json::Array(values.iter().cloned().map(Json::String).collect()),
            Value::Histogram(h) => h.to_json(),
            Value::Quantiles(q) => serde_json::json!({
                "probabilities": q.probabilities,
                "quantiles": q.quantiles,
                "min": q.min,
                "max": q.max,
            }),
            Value::Map(map) => Json::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map(Value::Text).unwrap_or(Value::Null)
    }
}
