use std::collections::BTreeMap;
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::types::Timestamp;
use crate::engine::cursor::{bucketize, candidate_rows};
use crate::engine::grouper::{decode, group_keys, Aggregation, Grouper};
use crate::query::ast::Query;
use crate::query::dispatcher::{QueryContext, QueryEngine, QueryKind};
use crate::query::results::{ResultRow, Sequence};
use crate::storage::segment_reader::QueryableSegment;

/// Groups candidate rows by (bucket, dimension values)
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupByEngine;

impl QueryEngine for GroupByEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::GroupBy
    }

    fn run(&self, query: &Query, segment: &QueryableSegment, ctx: &QueryContext) -> Result<Sequence> {
        let Query::GroupBy(query) = query else {
            return Err(Error::unsupported_query(format!("groupBy engine cannot run {}", query.kind())));
        };

        let aggregation = Aggregation::new(&query.aggregations, segment, &ctx.registry)?;
        let rows = candidate_rows(segment, &query.intervals, query.filter.as_ref())?;
        let dimensions: Vec<_> = query.dimensions.iter().map(|d| segment.dimension(d)).collect();

        let mut grouper: Grouper<'_, '_, (Timestamp, Vec<Option<u32>>)> =
            Grouper::new(&aggregation, ctx.max_intermediate_rows);
        for bucket in bucketize(segment, &rows, query.granularity, &query.intervals) {
            for row in bucket.rows.iter() {
                for key in group_keys(&dimensions, row) {
                    grouper.add((bucket.timestamp, key), row)?;
                }
            }
        }
        debug!(segment = %segment.id(), groups = grouper.len(), "grouped rows");

        // Codes follow sorted dictionary order, so this orders by bucket then values
        let mut groups = grouper.into_groups();
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut results = Vec::with_capacity(groups.len());
        for ((timestamp, codes), states) in groups {
            let mut event = BTreeMap::new();
            for ((name, column), code) in query.dimensions.iter().zip(&dimensions).zip(codes) {
                event.insert(name.clone(), decode(*column, code));
            }
            aggregation.finish(&states, &query.post_aggregations, &mut event)?;
            if query.having.as_ref().is_none_or(|having| having.eval(&event)) {
                results.push(ResultRow::new(timestamp, event));
            }
        }

        if let Some(limit_spec) = &query.limit_spec {
            results.sort_by(|a, b| limit_spec.compare(&a.event, &b.event));
            if let Some(limit) = limit_spec.limit {
                results.truncate(limit);
            }
        }
        Ok(Sequence::from_rows(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::post::{ArithmeticOp, PostAggregator};
    use crate::aggregation::registry::AggregatorSpec;
    use crate::aggregation::value::Value;
    use crate::core::error::ErrorKind;
    use crate::core::types::Interval;
    use crate::engine::testing::{pages_segment, wide_segment};
    use crate::query::ast::{Direction, GroupByQuery, HavingSpec, LimitSpec};
    use crate::query::filter::DimFilter;
    use crate::query::granularity::Granularity;

    fn run(query: GroupByQuery) -> Result<Vec<ResultRow>> {
        GroupByEngine.run(&Query::GroupBy(query), &pages_segment(), &QueryContext::default()).map(Sequence::to_vec)
    }

    fn by_page() -> GroupByQuery {
        GroupByQuery::new("pages")
            .with_dimension("page")
            .with_aggregation(AggregatorSpec::long_sum("edits", "rows"))
            .with_aggregation(AggregatorSpec::long_sum("added", "added"))
    }

    #[test]
    fn groups_by_dimension_in_value_order() {
        let rows = run(by_page()).unwrap();
        let summary: Vec<(Option<&str>, Option<i64>, Option<i64>)> = rows.iter()
            .map(|r| (r.dimension("page"), r.long_metric("edits"), r.long_metric("added")))
            .collect();
        assert_eq!(summary, vec![
            (Some("about"), Some(1), Some(7)),
            (Some("blog"), Some(1), Some(1)),
            (Some("home"), Some(4), Some(20)),
        ]);
        assert!(rows.iter().all(|r| r.timestamp == 0));
    }

    #[test]
    fn multi_value_dimension_counts_each_value() {
        let query = GroupByQuery::new("pages")
            .with_dimension("tags")
            .with_aggregation(AggregatorSpec::count("rows"));
        let rows = run(query).unwrap();
        let counts: Vec<(Option<&str>, Option<i64>)> = rows.iter().map(|r| (r.dimension("tags"), r.long_metric("rows"))).collect();
        assert_eq!(counts, vec![(None, Some(1)), (Some("a"), Some(3)), (Some("b"), Some(2)), (Some("c"), Some(2))]);
    }

    #[test]
    fn buckets_filters_and_post_aggregators() {
        let query = by_page()
            .with_granularity(Granularity::Minute)
            .with_intervals(vec![Interval::new(0, 120_000)])
            .with_filter(DimFilter::selector("user", "ann"))
            .with_post_aggregation(PostAggregator::arithmetic(
                "avg_added",
                ArithmeticOp::Divide,
                vec![PostAggregator::field_access("a", "added"), PostAggregator::field_access("e", "edits")],
            ));
        let rows = run(query).unwrap();
        let summary: Vec<(i64, Option<&str>, Option<f64>)> = rows.iter()
            .map(|r| (r.timestamp, r.dimension("page"), r.double_metric("avg_added")))
            .collect();
        assert_eq!(summary, vec![
            (0, Some("about"), Some(7.0)),
            (0, Some("home"), Some(10.0)),
            (60_000, Some("home"), Some(3.0)),
        ]);
    }

    #[test]
    fn having_and_limit_spec() {
        let query = by_page()
            .with_having(HavingSpec::less_than("added", 10.0))
            .with_limit_spec(LimitSpec::new().order_by("added", Direction::Descending).with_limit(1));
        let rows = run(query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dimension("page"), Some("about"));
    }

    #[test]
    fn histogram_columns_fold_at_query_time() {
        let query = GroupByQuery::new("pages")
            .with_dimension("user")
            .with_aggregation(AggregatorSpec::approx_histogram_fold("h", "delta_hist"))
            .with_aggregation(AggregatorSpec::double_max("max_delta", "max_delta"))
            .with_post_aggregation(PostAggregator::Max { name: "hmax".into(), field_name: "h".into() });
        let rows = run(query).unwrap();
        let ann = rows.iter().find(|r| r.dimension("user") == Some("ann")).unwrap();
        assert_eq!(ann.double_metric("max_delta"), Some(4.0));
        assert_eq!(ann.double_metric("hmax"), Some(4.0));
        assert!(matches!(ann.get("h"), Some(Value::Histogram(h)) if h.count() == 3));
    }

    #[test]
    fn failures_happen_before_any_row() {
        let err = run(by_page().with_filter(DimFilter::selector("colo", "x"))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FilterEvaluation);

        let err = run(by_page().with_aggregation(AggregatorSpec::new("median", "m", Some("added")))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        let limited = GroupByEngine.run(
            &Query::GroupBy(by_page()),
            &pages_segment(),
            &QueryContext { max_intermediate_rows: 2, ..QueryContext::default() },
        );
        assert_eq!(limited.unwrap_err().kind, ErrorKind::CapacityExceeded);
    }

    #[test]
    fn default_limit_caps_grouping_keys() {
        let ctx = QueryContext::default();
        let query = GroupByQuery::new("wide")
            .with_dimension("user")
            .with_aggregation(AggregatorSpec::long_sum("rows", "rows"));

        let at_limit = GroupByEngine.run(&Query::GroupBy(query.clone()), &wide_segment(ctx.max_intermediate_rows), &ctx);
        assert_eq!(at_limit.unwrap().to_vec().len(), ctx.max_intermediate_rows);

        let over = GroupByEngine.run(&Query::GroupBy(query), &wide_segment(ctx.max_intermediate_rows + 1), &ctx);
        assert_eq!(over.unwrap_err().kind, ErrorKind::CapacityExceeded);
    }
}
