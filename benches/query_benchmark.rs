use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use olapdex::aggregation::registry::{AggregatorRegistry, AggregatorSpec};
use olapdex::core::types::Record;
use olapdex::index::incremental::IncrementalIndex;
use olapdex::query::ast::{GroupByQuery, Query, SearchQuery, TimeSeriesQuery, TopNMetricSpec, TopNQuery};
use olapdex::query::dispatcher::{QueryContext, QueryDispatcher};
use olapdex::query::filter::{DimFilter, SearchQuerySpec};
use olapdex::query::granularity::Granularity;
use olapdex::schema::schema::{DimensionsSpec, IndexSchema};
use olapdex::storage::segment_reader::QueryableSegment;
use olapdex::storage::segment_writer::SegmentBuilder;
use rand::Rng;

/// Segment of `rows` random click records over roughly a day
fn create_segment(rows: usize) -> QueryableSegment {
    let mut rng = rand::thread_rng();
    let schema = IndexSchema::new(
        DimensionsSpec::explicit(&["page", "country", "device"]),
        vec![
            AggregatorSpec::count("rows"),
            AggregatorSpec::long_sum("bytes", "bytes"),
            AggregatorSpec::double_max("max_latency", "latency"),
        ],
    );
    let mut index = IncrementalIndex::new(schema, &AggregatorRegistry::default(), usize::MAX).unwrap();
    for i in 0..rows {
        let record = Record::new(i as i64 * (86_400_000 / rows as i64), vec!["page".into(), "country".into(), "device".into()])
            .with("page", format!("page_{}", rng.gen_range(0..200)))
            .with("country", format!("c{}", rng.gen_range(0..50)))
            .with("device", if rng.gen_bool(0.3) { "mobile" } else { "desktop" })
            .with("bytes", rng.gen_range(100..100_000i64))
            .with("latency", rng.gen_range(0.5..900.0f64));
        index.add(&record).unwrap();
    }
    SegmentBuilder::new(num_cpus::get()).unwrap().build(index.seal()).unwrap()
}

fn metrics() -> Vec<AggregatorSpec> {
    vec![
        AggregatorSpec::long_sum("rows", "rows"),
        AggregatorSpec::long_sum("bytes", "bytes"),
        AggregatorSpec::double_max("max_latency", "max_latency"),
    ]
}

fn bench_queries(c: &mut Criterion) {
    let segment = create_segment(100_000);
    let dispatcher = QueryDispatcher::new(QueryContext::default());

    let mut group_by = GroupByQuery::new("bench").with_dimension("country").with_dimension("device");
    let mut top_n = TopNQuery::new("bench", "page", TopNMetricSpec::numeric("bytes"), 10);
    let mut time_series = TimeSeriesQuery::new("bench").with_granularity(Granularity::Hour);
    for spec in metrics() {
        group_by = group_by.with_aggregation(spec.clone());
        top_n = top_n.with_aggregation(spec.clone());
        time_series = time_series.with_aggregation(spec);
    }

    let queries = [
        ("group_by", Query::GroupBy(group_by.clone())),
        ("group_by_filtered", Query::GroupBy(group_by.with_filter(DimFilter::selector("device", "mobile")))),
        ("top_n", Query::TopN(top_n)),
        ("time_series_hour", Query::TimeSeries(time_series)),
        ("search", Query::Search(SearchQuery::new("bench", SearchQuerySpec::insensitive_contains("GE_1")))),
    ];

    let mut group = c.benchmark_group("query");
    for (name, query) in queries.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), query, |b, query| {
            b.iter(|| black_box(dispatcher.run(query, &segment).unwrap().count()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
