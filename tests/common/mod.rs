#![allow(dead_code)]

use std::io::Cursor;
use olapdex::aggregation::registry::AggregatorSpec;
use olapdex::core::config::Config;
use olapdex::core::database::{EmbeddedOlap, IngestReport};
use olapdex::load::delimited::DelimitedRowSource;
use olapdex::query::granularity::Granularity;
use olapdex::schema::schema::{DimensionsSpec, IndexSchema};
use olapdex::storage::segment_reader::QueryableSegment;

pub const COLUMNS: [&str; 11] = ["colo", "pool", "report", "URL", "TS", "metric", "value", "count", "min", "max", "sum"];
pub const DIMENSIONS: [&str; 6] = ["colo", "pool", "report", "URL", "TS", "metric"];

/// Fifteen matching Duration rows (abc x12, xyz x3) plus noise that the
/// standard filter must drop, and two malformed lines.
pub fn report_csv() -> String {
    let mut lines = Vec::new();
    let mut ts = 1_400_000_000_000i64;
    let mut push = |lines: &mut Vec<String>, pool: &str, url: &str, metric: &str, value: f64, max: i64, sum: i64| {
        ts += 1000;
        lines.push(format!("slc,{},URLTransaction,{},{},{},{},1,0,{},{}", pool, url, ts, metric, value, max, sum));
    };

    push(&mut lines, "r1cart", "abc", "Duration", 124.0, 124, 124);
    push(&mut lines, "r1cart", "abc", "Duration", 123.0, 123, 123);
    for i in 0..10 {
        push(&mut lines, "r1cart", "abc", "Duration", i as f64, 0, 0);
    }
    push(&mut lines, "r1cart", "xyz", "Duration", 123.0, 123, 123);
    push(&mut lines, "r1cart", "xyz", "Duration", 1.0, 0, 0);
    push(&mut lines, "r1cart", "xyz", "Duration", 2.0, 0, 0);

    // other pools and metrics
    push(&mut lines, "r2cart", "abc", "Duration", 999.0, 999, 999);
    push(&mut lines, "r1cart", "abc", "Count", 5.0, 5, 5);
    push(&mut lines, "r1cart", "qqq", "Count", 7.0, 7, 7);

    lines.insert(3, "slc,r1cart,too,few".to_string());
    lines.insert(9, "slc,r1cart,URLTransaction,abc,notatime,Duration,1,1,0,1,1".to_string());
    lines.join("\n")
}

pub fn report_schema() -> IndexSchema {
    IndexSchema::new(
        DimensionsSpec::explicit(&DIMENSIONS),
        vec![
            AggregatorSpec::long_sum("agg_count", "count"),
            AggregatorSpec::double_max("agg_max", "max"),
            AggregatorSpec::double_min("agg_min", "min"),
            AggregatorSpec::double_sum("agg_sum", "sum"),
            AggregatorSpec::approx_histogram("agg_histogram", "value"),
        ],
    )
    .with_granularity(Granularity::All)
}

pub fn report_source(csv: &str) -> DelimitedRowSource<Cursor<Vec<u8>>> {
    DelimitedRowSource::new(Cursor::new(csv.as_bytes().to_vec()), &COLUMNS, &DIMENSIONS).with_timestamp_column("TS")
}

pub fn report_segment() -> (EmbeddedOlap, QueryableSegment, IngestReport) {
    let olap = EmbeddedOlap::in_memory(Config::default()).unwrap();
    let (segment, report) = olap.index(&mut report_source(&report_csv()), report_schema(), "report").unwrap();
    (olap, segment, report)
}
