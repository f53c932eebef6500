//! Shared fixture for engine tests.

use crate::aggregation::registry::{AggregatorRegistry, AggregatorSpec};
use crate::core::types::Record;
use crate::index::incremental::IncrementalIndex;
use crate::schema::schema::{DimensionsSpec, IndexSchema};
use crate::storage::segment_reader::QueryableSegment;
use crate::storage::segment_writer::SegmentBuilder;

/// Six rows, one per record, in this order:
///
/// | ts      | page  | user | tags  | added | delta |
/// |---------|-------|------|-------|-------|-------|
/// | 0       | home  | ann  | a, b  | 10    | 1.5   |
/// | 10_000  | home  | bob  | a     | 5     | 2.0   |
/// | 20_000  | about | ann  |       | 7     | -1.0  |
/// | 65_000  | home  | ann  | b     | 3     | 4.0   |
/// | 70_000  | blog  | cat  | a, c  | 1     | 0.5   |
/// | 190_000 | home  | bob  | c     | 2     | 3.0   |
pub fn pages_segment() -> QueryableSegment {
    let schema = IndexSchema::new(
        DimensionsSpec::explicit(&["page", "user", "tags"]),
        vec![
            AggregatorSpec::count("rows"),
            AggregatorSpec::long_sum("added", "added"),
            AggregatorSpec::double_max("max_delta", "delta"),
            AggregatorSpec::approx_histogram("delta_hist", "delta"),
        ],
    );
    let mut index = IncrementalIndex::new(schema, &AggregatorRegistry::default(), 100).unwrap();
    let rows: [(i64, &str, &str, &[&str], i64, f64); 6] = [
        (0, "home", "ann", &["a", "b"], 10, 1.5),
        (10_000, "home", "bob", &["a"], 5, 2.0),
        (20_000, "about", "ann", &[], 7, -1.0),
        (65_000, "home", "ann", &["b"], 3, 4.0),
        (70_000, "blog", "cat", &["a", "c"], 1, 0.5),
        (190_000, "home", "bob", &["c"], 2, 3.0),
    ];
    for (ts, page, user, tags, added, delta) in rows {
        let record = Record::new(ts, vec!["page".into(), "user".into(), "tags".into()])
            .with("page", page)
            .with("user", user)
            .with("tags", tags.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .with("added", added)
            .with("delta", delta);
        index.add(&record).unwrap();
    }
    SegmentBuilder::new(1).unwrap().build(index.seal()).unwrap()
}

/// `rows` rows one second apart, each with its own `user`
/// (`u00000`, `u00001`, ...) and `added` equal to its index.
pub fn wide_segment(rows: usize) -> QueryableSegment {
    let schema = IndexSchema::new(
        DimensionsSpec::explicit(&["user"]),
        vec![AggregatorSpec::count("rows"), AggregatorSpec::long_sum("added", "added")],
    );
    let mut index = IncrementalIndex::new(schema, &AggregatorRegistry::default(), usize::MAX).unwrap();
    for i in 0..rows {
        let record = Record::new(i as i64 * 1000, vec!["user".into()])
            .with("user", format!("u{:05}", i))
            .with("added", i as i64);
        index.add(&record).unwrap();
    }
    SegmentBuilder::new(1).unwrap().build(index.seal()).unwrap()
}
