use std::collections::BTreeMap;
use crate::aggregation::value::Value;
use crate::core::error::{Error, Result};
use crate::core::types::Timestamp;
use crate::engine::cursor::{bucketize, candidate_rows, period_buckets};
use crate::engine::grouper::{Aggregation, Grouper};
use crate::query::ast::Query;
use crate::query::dispatcher::{QueryContext, QueryEngine, QueryKind};
use crate::query::results::{ResultRow, Sequence};
use crate::storage::segment_reader::QueryableSegment;

/// One aggregate row per time bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesEngine;

impl QueryEngine for TimeSeriesEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::TimeSeries
    }

    fn run(&self, query: &Query, segment: &QueryableSegment, ctx: &QueryContext) -> Result<Sequence> {
        let Query::TimeSeries(query) = query else {
            return Err(Error::unsupported_query(format!("timeseries engine cannot run {}", query.kind())));
        };

        let aggregation = Aggregation::new(&query.aggregations, segment, &ctx.registry)?;
        let rows = candidate_rows(segment, &query.intervals, query.filter.as_ref())?;

        let mut grouper: Grouper<'_, '_, Timestamp> = Grouper::new(&aggregation, usize::MAX);
        for bucket in bucketize(segment, &rows, query.granularity, &query.intervals) {
            for row in bucket.rows.iter() {
                grouper.add(bucket.timestamp, row)?;
            }
        }
        let mut groups: BTreeMap<Timestamp, Vec<Value>> = grouper.into_groups().into_iter().collect();

        // Empty buckets carry the aggregators' initial values
        if !query.skip_empty_buckets {
            for stamp in period_buckets(segment, &query.intervals, query.granularity) {
                groups.entry(stamp).or_insert_with(|| aggregation.initial_states());
            }
        }

        let mut results = Vec::with_capacity(groups.len());
        for (timestamp, states) in groups {
            let mut event = BTreeMap::new();
            aggregation.finish(&states, &query.post_aggregations, &mut event)?;
            results.push(ResultRow::new(timestamp, event));
        }
        Ok(Sequence::from_rows(results))
    }
}
