use std::collections::BTreeMap;
use tracing::debug;
use crate::aggregation::value::Value;
use crate::core::error::{Error, Result};
use crate::query::ast::Query;
use crate::query::dispatcher::{QueryContext, QueryEngine, QueryKind};
use crate::query::results::{ResultRow, Sequence};
use crate::storage::column::{DimensionColumn, MetricColumn};
use crate::storage::segment_reader::QueryableSegment;

pub const TIME_COLUMN: &str = "__time";

/// Column statistics of the segment
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentMetadataEngine;

impl QueryEngine for SegmentMetadataEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::SegmentMetadata
    }

    fn run(&self, query: &Query, segment: &QueryableSegment, _ctx: &QueryContext) -> Result<Sequence> {
        let Query::SegmentMetadata(query) = query else {
            return Err(Error::unsupported_query(format!("segmentMetadata engine cannot run {}", query.kind())));
        };

        let interval = segment.interval();
        if !query.intervals.iter().any(|i| i.overlaps(&interval)) {
            return Ok(Sequence::empty());
        }

        let mut columns = BTreeMap::new();
        if query.to_include.includes(TIME_COLUMN) {
            columns.insert(TIME_COLUMN.to_string(), time_analysis(segment));
        }
        for dimension in segment.dimensions() {
            if query.to_include.includes(&dimension.name) {
                columns.insert(dimension.name.clone(), dimension_analysis(dimension));
            }
        }
        for metric in segment.metrics() {
            if query.to_include.includes(&metric.name) {
                columns.insert(metric.name.clone(), metric_analysis(metric));
            }
        }
        debug!(segment = %segment.id(), columns = columns.len(), "analyzed segment");

        let mut event = BTreeMap::new();
        event.insert("id".to_string(), Value::Text(segment.id().to_string()));
        event.insert("intervals".to_string(), Value::TextList(vec![interval.to_string()]));
        event.insert("columns".to_string(), Value::Map(columns));
        event.insert("size".to_string(), Value::Long(segment.size_bytes() as i64));
        event.insert("numRows".to_string(), Value::Long(segment.row_count() as i64));
        Ok(Sequence::from_rows(vec![ResultRow::new(interval.start, event)]))
    }
}

fn analysis(type_name: &str, size: u64) -> BTreeMap<String, Value> {
    let mut column = BTreeMap::new();
    column.insert("type".to_string(), Value::from(type_name));
    column.insert("size".to_string(), Value::Long(size as i64));
    column.insert("hasMultipleValues".to_string(), Value::Bool(false));
    column
}

fn time_analysis(segment: &QueryableSegment) -> Value {
    let mut column = analysis("LONG", segment.row_count() as u64 * 8);
    if let Some((min, max)) = segment.time_range() {
        column.insert("minValue".to_string(), Value::Long(min));
        column.insert("maxValue".to_string(), Value::Long(max));
    }
    Value::Map(column)
}

fn dimension_analysis(dimension: &DimensionColumn) -> Value {
    let mut column = analysis("STRING", dimension.size_estimate());
    column.insert("cardinality".to_string(), Value::Long(dimension.cardinality() as i64));
    column.insert("hasMultipleValues".to_string(), Value::Bool(dimension.multi_value));
    let values = dimension.dictionary.values();
    column.insert("minValue".to_string(), values.first().cloned().into());
    column.insert("maxValue".to_string(), values.last().cloned().into());
    Value::Map(column)
}

fn metric_analysis(metric: &MetricColumn) -> Value {
    let storage = match metric.type_name.as_str() {
        "count" | "longSum" | "longMin" | "longMax" => "LONG",
        "doubleSum" | "min" | "max" => "DOUBLE",
        _ => "COMPLEX",
    };
    let size = if storage == "COMPLEX" { 0 } else { metric.values.len() as u64 * 8 };
    let mut column = analysis(storage, size);
    column.insert("typeName".to_string(), Value::from(metric.type_name.as_str()));

    if storage != "COMPLEX" {
        let numbers = metric.values.iter().filter(|v| v.is_numeric());
        if let Some(min) = numbers.clone().min_by(|a, b| a.compare(b)) {
            column.insert("minValue".to_string(), min.clone());
        }
        if let Some(max) = numbers.max_by(|a, b| a.compare(b)) {
            column.insert("maxValue".to_string(), max.clone());
        }
    }
    Value::Map(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Interval;
    use crate::engine::testing::pages_segment;
    use crate::query::ast::SegmentMetadataQuery;

    fn run(query: SegmentMetadataQuery) -> Vec<ResultRow> {
        SegmentMetadataEngine
            .run(&Query::SegmentMetadata(query), &pages_segment(), &QueryContext::default())
            .unwrap()
            .to_vec()
    }

    fn columns(row: &ResultRow) -> &BTreeMap<String, Value> {
        match row.get("columns") {
            Some(Value::Map(columns)) => columns,
            other => panic!("columns missing: {:?}", other),
        }
    }

    fn field<'a>(columns: &'a BTreeMap<String, Value>, column: &str, key: &str) -> Option<&'a Value> {
        match columns.get(column) {
            Some(Value::Map(stats)) => stats.get(key),
            _ => None,
        }
    }

    #[test]
    fn analyzes_every_column() {
        let rows = run(SegmentMetadataQuery::new("pages"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].long_metric("numRows"), Some(6));
        let columns = columns(&rows[0]);
        assert_eq!(columns.len(), 1 + 3 + 4);

        assert_eq!(field(columns, "__time", "maxValue"), Some(&Value::Long(190_000)));
        assert_eq!(field(columns, "page", "cardinality"), Some(&Value::Long(3)));
        assert_eq!(field(columns, "page", "minValue"), Some(&Value::from("about")));
        assert_eq!(field(columns, "page", "maxValue"), Some(&Value::from("home")));
        assert_eq!(field(columns, "tags", "hasMultipleValues"), Some(&Value::Bool(true)));
        assert_eq!(field(columns, "user", "hasMultipleValues"), Some(&Value::Bool(false)));
        assert_eq!(field(columns, "added", "type"), Some(&Value::from("LONG")));
        assert_eq!(field(columns, "added", "maxValue"), Some(&Value::Long(10)));
        assert_eq!(field(columns, "max_delta", "minValue"), Some(&Value::Double(-1.0)));
        assert_eq!(field(columns, "delta_hist", "type"), Some(&Value::from("COMPLEX")));
        assert_eq!(field(columns, "delta_hist", "typeName"), Some(&Value::from("approxHistogram")));
        let json = rows[0].to_json();
        assert_eq!(json["event"]["columns"]["tags"]["hasMultipleValues"], serde_json::Value::Bool(true));
    }

    #[test]
    fn column_selection() {
        let rows = run(SegmentMetadataQuery::new("pages").with_columns(&["user", "rows", "nope"]));
        let names: Vec<&String> = columns(&rows[0]).keys().collect();
        assert_eq!(names, vec!["rows", "user"]);
    }

    #[test]
    fn disjoint_interval_is_empty() {
        let mut query = SegmentMetadataQuery::new("pages");
        query.intervals = vec![Interval::new(1_000_000, 2_000_000)];
        assert!(run(query).is_empty());
    }
}
