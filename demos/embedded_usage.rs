//! Ingest a small CSV report, persist it, and run a few queries.
//!
//! Run with `cargo run --example embedded_usage`.

use std::io::Cursor;
use olapdex::aggregation::post::PostAggregator;
use olapdex::aggregation::registry::AggregatorSpec;
use olapdex::core::config::Config;
use olapdex::core::database::EmbeddedOlap;
use olapdex::load::delimited::DelimitedRowSource;
use olapdex::query::ast::{GroupByQuery, Query, SegmentMetadataQuery, TopNMetricSpec, TopNQuery};
use olapdex::query::filter::DimFilter;
use olapdex::query::granularity::Granularity;
use olapdex::schema::schema::{DimensionsSpec, IndexSchema};

const REPORT: &str = "\
slc,r1cart,URLTransaction,abc,1400000001000,Duration,124,1,0,124,124
slc,r1cart,URLTransaction,abc,1400000002000,Duration,123,1,0,123,123
slc,r1cart,URLTransaction,xyz,1400000003000,Duration,40,1,0,40,40
slc,r1cart,URLTransaction,xyz,1400000004000,Duration,12,1,0,12,12
lvs,r2cart,URLTransaction,abc,1400000005000,Duration,77,1,0,77,77
broken,line
";

fn main() -> olapdex::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let columns = ["colo", "pool", "report", "URL", "TS", "metric", "value", "count", "min", "max", "sum"];
    let dimensions = ["colo", "pool", "report", "URL", "metric"];
    let mut source = DelimitedRowSource::new(Cursor::new(REPORT.as_bytes().to_vec()), &columns, &dimensions)
        .with_timestamp_column("TS");

    let schema = IndexSchema::new(
        DimensionsSpec::explicit(&dimensions),
        vec![
            AggregatorSpec::long_sum("agg_count", "count"),
            AggregatorSpec::double_max("agg_max", "max"),
            AggregatorSpec::double_sum("agg_sum", "sum"),
            AggregatorSpec::approx_histogram("agg_histogram", "value"),
        ],
    )
    .with_granularity(Granularity::Hour);

    let olap = EmbeddedOlap::open(Config::from_env())?;
    let (segment, report) = olap.index(&mut source, schema, "demo/report")?;
    println!("ingest: {:?}", report);

    let group_by = GroupByQuery::new("report")
        .with_filter(DimFilter::selector("report", "URLTransaction"))
        .with_dimension("URL")
        .with_aggregation(AggregatorSpec::long_sum("agg_count", "agg_count"))
        .with_aggregation(AggregatorSpec::double_sum("agg_sum", "agg_sum"))
        .with_aggregation(AggregatorSpec::approx_histogram_fold("agg_histogram", "agg_histogram"))
        .with_post_aggregation(PostAggregator::quantile("p50", "agg_histogram", 0.5));
    for row in olap.run(&Query::GroupBy(group_by), &segment)? {
        println!("groupBy  {}", row.to_json());
    }

    let top_n = TopNQuery::new("report", "pool", TopNMetricSpec::numeric("agg_sum"), 1)
        .with_aggregation(AggregatorSpec::double_sum("agg_sum", "agg_sum"));
    for row in olap.run(&Query::TopN(top_n), &segment)? {
        println!("topN     {}", row.to_json());
    }

    for row in olap.run(&Query::SegmentMetadata(SegmentMetadataQuery::new("report").with_columns(&["URL"])), &segment)? {
        println!("metadata {}", row.to_json());
    }
    Ok(())
}
