use std::collections::BTreeMap;
use crate::aggregation::value::Value;
use crate::core::error::{Error, Result};
use crate::engine::cursor::candidate_rows;
use crate::query::ast::{Query, TimeBound};
use crate::query::dispatcher::{QueryContext, QueryEngine, QueryKind};
use crate::query::results::{ResultRow, Sequence};
use crate::storage::segment_reader::QueryableSegment;

/// Earliest and latest timestamp among candidate rows
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeBoundaryEngine;

impl QueryEngine for TimeBoundaryEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::TimeBoundary
    }

    fn run(&self, query: &Query, segment: &QueryableSegment, _ctx: &QueryContext) -> Result<Sequence> {
        let Query::TimeBoundary(query) = query else {
            return Err(Error::unsupported_query(format!("timeBoundary engine cannot run {}", query.kind())));
        };

        let rows = candidate_rows(segment, &query.intervals, query.filter.as_ref())?;
        // Rows are time-sorted: the first and last candidates bound the range
        let (Some(min), Some(max)) = (
            rows.min().and_then(|r| segment.timestamp_at(r)),
            rows.max().and_then(|r| segment.timestamp_at(r)),
        ) else {
            return Ok(Sequence::empty());
        };

        let mut event = BTreeMap::new();
        let timestamp = match query.bound {
            Some(TimeBound::MinTime) => {
                event.insert("minTime".to_string(), Value::Long(min));
                min
            }
            Some(TimeBound::MaxTime) => {
                event.insert("maxTime".to_string(), Value::Long(max));
                max
            }
            None => {
                event.insert("minTime".to_string(), Value::Long(min));
                event.insert("maxTime".to_string(), Value::Long(max));
                min
            }
        };
        Ok(Sequence::from_rows(vec![ResultRow::new(timestamp, event)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Interval;
    use crate::engine::testing::pages_segment;
    use crate::query::ast::TimeBoundaryQuery;
    use crate::query::filter::DimFilter;

    fn run(query: TimeBoundaryQuery) -> Vec<ResultRow> {
        TimeBoundaryEngine
            .run(&Query::TimeBoundary(query), &pages_segment(), &QueryContext::default())
            .unwrap()
            .to_vec()
    }

    #[test]
    fn full_range() {
        let rows = run(TimeBoundaryQuery::new("pages"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, 0);
        assert_eq!(rows[0].long_metric("minTime"), Some(0));
        assert_eq!(rows[0].long_metric("maxTime"), Some(190_000));
    }

    #[test]
    fn filter_and_bound() {
        let rows = run(TimeBoundaryQuery::new("pages")
            .with_filter(DimFilter::selector("user", "ann"))
            .with_bound(TimeBound::MaxTime));
        assert_eq!(rows[0].timestamp, 65_000);
        assert_eq!(rows[0].long_metric("maxTime"), Some(65_000));
        assert_eq!(rows[0].get("minTime"), None);
    }

    #[test]
    fn no_candidates_no_rows() {
        let mut query = TimeBoundaryQuery::new("pages");
        query.intervals = vec![Interval::new(500_000, 600_000)];
        assert!(run(query).is_empty());
    }
}
