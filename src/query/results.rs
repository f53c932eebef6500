use std::collections::BTreeMap;
use std::fmt;
use crate::aggregation::value::Value;
use crate::core::types::{format_millis, Timestamp};

/// One output row: bucket timestamp plus named cells
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub timestamp: Timestamp,
    pub event: BTreeMap<String, Value>,
}

impl ResultRow {
    pub fn new(timestamp: Timestamp, event: BTreeMap<String, Value>) -> Self {
        ResultRow { timestamp, event }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.event.get(name)
    }

    /// Single string value of a grouped dimension; `None` for null
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.event.get(name).and_then(Value::as_str)
    }

    pub fn long_metric(&self, name: &str) -> Option<i64> {
        self.event.get(name).and_then(Value::as_i64)
    }

    pub fn double_metric(&self, name: &str) -> Option<f64> {
        self.event.get(name).and_then(Value::as_f64)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let event: serde_json::Map<String, serde_json::Value> =
            self.event.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        serde_json::json!({
            "timestamp": format_millis(self.timestamp),
            "event": event,
        })
    }
}

/// Lazily produced result rows. Engines fail before constructing one, so a
/// sequence never yields a partial result followed by an error.
pub struct Sequence {
    rows: Box<dyn Iterator<Item = ResultRow> + Send>,
}

impl Sequence {
    pub fn new<I>(rows: I) -> Self
    where
        I: Iterator<Item = ResultRow> + Send + 'static,
    {
        Sequence { rows: Box::new(rows) }
    }

    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        Self::new(rows.into_iter())
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn to_vec(self) -> Vec<ResultRow> {
        self.collect()
    }
}

impl Iterator for Sequence {
    type Item = ResultRow;

    fn next(&mut self) -> Option<ResultRow> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence").field("size_hint", &self.rows.size_hint()).finish()
    }
}
