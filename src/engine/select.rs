use std::collections::BTreeMap;
use crate::aggregation::value::Value;
use crate::core::error::{Error, Result};
use crate::engine::cursor::candidate_rows;
use crate::engine::grouper::dimension_value;
use crate::query::ast::Query;
use crate::query::dispatcher::{QueryContext, QueryEngine, QueryKind};
use crate::query::results::{ResultRow, Sequence};
use crate::storage::segment_reader::QueryableSegment;

/// Raw segment rows, paged. Rows are materialized one at a time as the
/// sequence is pulled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectEngine;

impl QueryEngine for SelectEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::Select
    }

    fn run(&self, query: &Query, segment: &QueryableSegment, _ctx: &QueryContext) -> Result<Sequence> {
        let Query::Select(query) = query else {
            return Err(Error::unsupported_query(format!("select engine cannot run {}", query.kind())));
        };

        let rows = candidate_rows(segment, &query.intervals, query.filter.as_ref())?;
        let dimensions: Vec<String> = if query.dimensions.is_empty() {
            segment.dimension_names().map(String::from).collect()
        } else {
            query.dimensions.clone()
        };
        let metrics: Vec<String> = if query.metrics.is_empty() {
            segment.metric_names().map(String::from).collect()
        } else {
            query.metrics.clone()
        };

        let positions: Box<dyn Iterator<Item = u32> + Send> = if query.descending {
            let mut positions: Vec<u32> = rows.into_iter().collect();
            positions.reverse();
            Box::new(positions.into_iter())
        } else {
            Box::new(rows.into_iter())
        };

        let segment = segment.clone();
        let offset = query.paging_spec.offset;
        let results = positions
            .enumerate()
            .skip(offset)
            .take(query.paging_spec.threshold)
            .map(move |(index, row)| {
                let mut event = BTreeMap::new();
                event.insert("offset".to_string(), Value::Long(index as i64));
                for name in &dimensions {
                    let value = segment.dimension(name).map(|c| dimension_value(c, row)).unwrap_or(Value::Null);
                    event.insert(name.clone(), value);
                }
                for name in &metrics {
                    let value = segment.metric_at(name, row).cloned().unwrap_or(Value::Null);
                    event.insert(name.clone(), value);
                }
                ResultRow::new(segment.timestamp_at(row).unwrap_or_default(), event)
            });
        Ok(Sequence::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::pages_segment;
    use crate::query::ast::SelectQuery;
    use crate::query::filter::DimFilter;

    fn run(query: SelectQuery) -> Vec<ResultRow> {
        SelectEngine.run(&Query::Select(query), &pages_segment(), &QueryContext::default()).unwrap().to_vec()
    }

    #[test]
    fn pages_through_rows() {
        let rows = run(SelectQuery::new("pages", 2).with_offset(1));
        let stamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![10_000, 20_000]);
        assert_eq!(rows[0].long_metric("offset"), Some(1));
        assert_eq!(rows[0].dimension("user"), Some("bob"));
        assert_eq!(rows[0].long_metric("added"), Some(5));
        // every column by default
        assert_eq!(rows[0].event.len(), 1 + 3 + 4);
    }

    #[test]
    fn descending_with_filter_and_columns() {
        let query = SelectQuery::new("pages", 10)
            .with_filter(DimFilter::selector("user", "ann"))
            .with_dimension("tags")
            .with_metric("added")
            .descending(true);
        let rows = run(query);
        let stamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![65_000, 20_000, 0]);
        assert_eq!(rows[1].get("tags"), Some(&Value::Null));
        assert_eq!(rows[2].get("tags"), Some(&Value::TextList(vec!["a".into(), "b".into()])));
        assert_eq!(rows[2].event.len(), 3);
    }

    #[test]
    fn offset_past_end_is_empty() {
        assert!(run(SelectQuery::new("pages", 5).with_offset(6)).is_empty());
    }
}
