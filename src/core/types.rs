use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Half-open time range `[start, end)` in epoch millis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Interval {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Interval { start, end }
    }

    /// Interval covering every representable timestamp
    pub fn eternity() -> Self {
        Interval { start: i64::MIN, end: i64::MAX }
    }

    /// Interval from `start` up to the current wall clock
    pub fn until_now(start: Timestamp) -> Self {
        Interval { start, end: Utc::now().timestamp_millis() }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Interval { start, end })
        } else {
            None
        }
    }

    pub fn duration_millis(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_millis(self.start), format_millis(self.end))
    }
}

/// ISO-8601 rendering, falling back to the raw number outside chrono's range
pub fn format_millis(ts: Timestamp) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ts) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => ts.to_string(),
    }
}

/// Raw value of one event field as produced by a row source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Long(i64),
    Double(f64),
}

impl FieldValue {
    /// Dimension view: every value rendered as a string
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            FieldValue::Text(s) => vec![s.clone()],
            FieldValue::List(values) => values.clone(),
            FieldValue::Long(v) => vec![v.to_string()],
            FieldValue::Double(v) => vec![v.to_string()],
        }
    }

    /// Numeric view; `None` when the value cannot be read as a number
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Long(v) => Some(*v as f64),
            FieldValue::Double(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::List(values) if values.len() == 1 => values[0].trim().parse::<f64>().ok(),
            FieldValue::List(_) => None,
        }
    }

    /// Integral view. Fractional text is truncated toward zero.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Long(v) => Some(*v),
            FieldValue::Double(v) => Some(*v as i64),
            FieldValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|v| v as i64))
            }
            FieldValue::List(_) => self.to_f64().map(|v| v as i64),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::List(values)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

/// One ingested row: timestamp, the names of its dimensions and the raw event map.
/// Immutable once produced by a row source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: Timestamp,
    pub dimensions: Vec<String>,
    pub event: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new(timestamp: Timestamp, dimensions: Vec<String>) -> Self {
        Record {
            timestamp,
            dimensions,
            event: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.event.insert(name.to_string(), value.into());
        self
    }

    pub fn raw(&self, name: &str) -> Option<&FieldValue> {
        self.event.get(name)
    }

    /// Values of a dimension; empty when the event has none
    pub fn dimension_values(&self, name: &str) -> Vec<String> {
        self.event.get(name).map(|v| v.to_strings()).unwrap_or_default()
    }
}
