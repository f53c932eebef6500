mod common;

use olapdex::aggregation::post::PostAggregator;
use olapdex::aggregation::registry::{AggregatorRegistry, AggregatorSpec};
use olapdex::aggregation::value::Value;
use olapdex::core::config::Config;
use olapdex::core::database::EmbeddedOlap;
use olapdex::core::error::ErrorKind;
use olapdex::core::types::Record;
use olapdex::index::incremental::IncrementalIndex;
use olapdex::query::ast::{GroupByQuery, Query, TopNMetricSpec, TopNQuery};
use olapdex::query::filter::DimFilter;
use olapdex::query::granularity::Granularity;
use olapdex::schema::schema::{DimensionsSpec, IndexSchema};
use olapdex::storage::segment_writer::SegmentBuilder;

use common::*;

fn duration_filter() -> DimFilter {
    DimFilter::and(vec![
        DimFilter::selector("report", "URLTransaction"),
        DimFilter::selector("pool", "r1cart"),
        DimFilter::selector("metric", "Duration"),
    ])
}

#[test]
fn ingest_report_counts_lines() {
    let (_, segment, report) = report_segment();
    assert_eq!(report.records_read, 18);
    assert_eq!(report.records_added, 18);
    assert_eq!(report.malformed, 2);
    assert_eq!(report.rejected, 0);
    assert!(!report.truncated);
    // TS is a dimension, so no two lines roll up together
    assert_eq!(segment.row_count(), 18);
}

#[test]
fn group_by_url_matches_ingested_totals() {
    let (olap, segment, _) = report_segment();
    let query = GroupByQuery::new("test")
        .with_granularity(Granularity::None)
        .with_filter(duration_filter())
        .with_dimension("URL")
        .with_aggregation(AggregatorSpec::long_sum("agg_count", "agg_count"))
        .with_aggregation(AggregatorSpec::double_max("agg_max", "agg_max"))
        .with_aggregation(AggregatorSpec::double_min("agg_min", "agg_min"))
        .with_aggregation(AggregatorSpec::double_sum("agg_sum", "agg_sum"))
        .with_aggregation(
            AggregatorSpec::approx_histogram_fold("agg_histogram", "agg_histogram")
                .with_param("resolution", 20.0)
                .with_param("numBuckets", 5.0),
        )
        .with_post_aggregation(PostAggregator::quantiles(
            "agg_quantiles",
            "agg_histogram",
            vec![0.25, 0.5, 0.75, 0.95, 0.99],
        ));

    let rows = olap.run(&Query::GroupBy(query), &segment).unwrap().to_vec();
    assert_eq!(rows.len(), 2);

    let abc = rows.iter().find(|r| r.dimension("URL") == Some("abc")).unwrap();
    assert_eq!(abc.long_metric("agg_count"), Some(12));
    assert_eq!(abc.long_metric("agg_sum"), Some(247));
    assert_eq!(abc.long_metric("agg_min"), Some(0));
    assert_eq!(abc.long_metric("agg_max"), Some(124));

    let xyz = rows.iter().find(|r| r.dimension("URL") == Some("xyz")).unwrap();
    assert_eq!(xyz.long_metric("agg_count"), Some(3));
    assert_eq!(xyz.long_metric("agg_sum"), Some(123));
    assert_eq!(xyz.long_metric("agg_min"), Some(0));
    assert_eq!(xyz.long_metric("agg_max"), Some(123));

    match abc.get("agg_quantiles") {
        Some(Value::Quantiles(q)) => {
            assert_eq!(q.quantiles.len(), 5);
            assert_eq!(q.min, 0.0);
            assert_eq!(q.max, 124.0);
            assert!(q.quantiles.windows(2).all(|w| w[0] <= w[1]));
        }
        other => panic!("expected quantiles, got {:?}", other),
    }
}

#[test]
fn filter_returns_only_matching_values() {
    let (olap, segment, _) = report_segment();
    let query = GroupByQuery::new("test")
        .with_filter(DimFilter::selector("URL", "xyz"))
        .with_dimension("URL")
        .with_dimension("pool")
        .with_aggregation(AggregatorSpec::long_sum("agg_count", "agg_count"));
    let rows = olap.run(&Query::GroupBy(query), &segment).unwrap().to_vec();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.dimension("URL") == Some("xyz")));
}

#[test]
fn top_n_with_one_value_returns_one_row() {
    let (olap, segment, _) = report_segment();
    let query = TopNQuery::new("test", "pool", TopNMetricSpec::numeric("agg_count"), 5)
        .with_filter(duration_filter())
        .with_aggregation(AggregatorSpec::long_sum("agg_count", "agg_count"));
    let rows = olap.run(&Query::TopN(query), &segment).unwrap().to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].dimension("pool"), Some("r1cart"));
    assert_eq!(rows[0].long_metric("agg_count"), Some(15));
}

#[test]
fn top_n_threshold_bounds_and_orders() {
    let (olap, segment, _) = report_segment();
    let query = TopNQuery::new("test", "URL", TopNMetricSpec::numeric("agg_count"), 2)
        .with_aggregation(AggregatorSpec::long_sum("agg_count", "agg_count"));
    let rows = olap.run(&Query::TopN(query), &segment).unwrap().to_vec();
    // abc 14, xyz 3, qqq 1
    let summary: Vec<(Option<&str>, Option<i64>)> = rows.iter()
        .map(|r| (r.dimension("URL"), r.long_metric("agg_count")))
        .collect();
    assert_eq!(summary, vec![(Some("abc"), Some(14)), (Some("xyz"), Some(3))]);
}

#[test]
fn same_query_twice_gives_same_rows() {
    let (olap, segment, _) = report_segment();
    let query = Query::GroupBy(
        GroupByQuery::new("test")
            .with_dimension("URL")
            .with_dimension("metric")
            .with_aggregation(AggregatorSpec::double_sum("agg_sum", "agg_sum")),
    );
    let first = olap.run(&query, &segment).unwrap().to_vec();
    let second = olap.run(&query, &segment).unwrap().to_vec();
    assert_eq!(first, second);
}

#[test]
fn unknown_filter_dimension_aborts_query() {
    let (olap, segment, _) = report_segment();
    let query = GroupByQuery::new("test")
        .with_filter(DimFilter::selector("datacenter", "x"))
        .with_dimension("URL")
        .with_aggregation(AggregatorSpec::count("rows"));
    let err = olap.run(&Query::GroupBy(query), &segment).unwrap_err();
    assert_eq!(err.kind, ErrorKind::FilterEvaluation);
}

#[test]
fn json_queries_run_through_the_facade() {
    let (olap, segment, _) = report_segment();
    let json = r#"{
        "queryType": "timeseries",
        "dataSource": "test",
        "filter": {"type": "selector", "dimension": "URL", "value": "abc"},
        "aggregations": [{"type": "longSum", "name": "agg_count", "fieldName": "agg_count"}]
    }"#;
    let rows = olap.run_json(json, &segment).unwrap().to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].long_metric("agg_count"), Some(14));
}

#[test]
fn capacity_limit_keeps_earlier_rows_buildable() {
    let registry = AggregatorRegistry::default();
    let schema = IndexSchema::new(DimensionsSpec::explicit(&["host"]), vec![AggregatorSpec::count("rows")]);
    let mut index = IncrementalIndex::new(schema, &registry, 2).unwrap();
    let record = |host: &str| Record::new(0, vec!["host".into()]).with("host", host);

    index.add(&record("a")).unwrap();
    index.add(&record("b")).unwrap();
    let err = index.add(&record("c")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CapacityExceeded);
    // Rejection is sticky, even for keys that already exist
    assert_eq!(index.add(&record("a")).unwrap_err().kind, ErrorKind::CapacityExceeded);

    let segment = SegmentBuilder::new(1).unwrap().build(index.seal()).unwrap();
    assert_eq!(segment.row_count(), 2);
    assert_eq!(segment.dimension("host").unwrap().dictionary.values(), &["a".to_string(), "b".to_string()]);
}

#[test]
fn facade_truncates_at_capacity() {
    let olap = EmbeddedOlap::in_memory(Config::default().with_max_rows(5)).unwrap();
    let (segment, report) = olap.index(&mut report_source(&report_csv()), report_schema(), "small").unwrap();
    assert!(report.truncated);
    assert_eq!(segment.row_count(), 5);
}
