pub mod core;
pub mod schema;
pub mod aggregation;
pub mod compression;
pub mod index;
pub mod storage;
pub mod query;
pub mod engine;
pub mod load;

pub use crate::core::{Config, EmbeddedOlap, Error, ErrorKind, IngestReport, Result};
pub use crate::query::{Query, ResultRow, Sequence};
pub use crate::storage::QueryableSegment;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                              OLAPDEX STRUCT ARCHITECTURE                                    │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                           struct EmbeddedOlap<W>                                    │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Config                    // Segment root, limits, index spec        │ │    │
│  │  │ store: Box<dyn SegmentStore>      // File or memory segment storage          │ │    │
│  │  │ registry: Arc<AggregatorRegistry> // Aggregator name → factory builder       │ │    │
│  │  │ builder: SegmentBuilder           // Sealed index → columnar segment         │ │    │
│  │  │ dispatcher: QueryDispatcher<W>    // QueryKind → engine table                │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct Config    │  │ struct Record    │  │ struct IngestReport                   │    │
│  │ • segment_dir    │  │ • timestamp      │  │ • records_read / records_added        │    │
│  │ • max_rows       │  │ • dimensions     │  │ • rows                                │    │
│  │ • build_threads  │  │ • event:         │  │ • malformed / rejected                │    │
│  │ • index_spec     │  │   HashMap<String,│  │ • truncated / reused                  │    │
│  │ • max_inter_rows │  │   FieldValue>    │  └───────────────────────────────────────┘    │
│  │ • search_limit   │  └──────────────────┘                                                │
│  └──────────────────┘                        ┌───────────────────────────────────────┐    │
│  ┌──────────────────┐  ┌──────────────────┐  │ trait QueryWatcher                    │    │
│  │ struct Interval  │  │ enum FieldValue  │  │ • query_started()                     │    │
│  │ • start (ms)     │  │ • Text(String)   │  │ • query_finished()                    │    │
│  │ • end (ms)       │  │ • List(Vec<Str>) │  │ NoopWatcher / TracingWatcher /        │    │
│  └──────────────────┘  │ • Long(i64)      │  │ StatsWatcher                          │    │
│                        │ • Double(f64)    │  └───────────────────────────────────────┘    │
│                        └──────────────────┘                                                │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── INGEST LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────┐  ┌──────────────────────────┐  ┌────────────────────────┐      │
│  │ trait RowSource        │  │ struct IncrementalIndex  │  │ struct DimensionDict   │      │
│  │ • next_record()        │  │ • schema: IndexSchema    │  │ • values: Vec<String>  │      │
│  │ • skipped()            │  │ • factories: Vec<Box<>>  │  │ • ids: HashMap         │      │
│  │ DelimitedRowSource     │  │ • dictionaries           │  │ freeze() → Sorted +    │      │
│  │ VecRowSource           │  │ • rows: HashMap<Key,idx> │  │           remap table  │      │
│  └────────────────────────┘  │ • max_rows / full        │  └────────────────────────┘      │
│                               └──────────────────────────┘                                  │
│  ┌────────────────────────┐  ┌──────────────────────────┐  ┌────────────────────────┐      │
│  │ struct AggregatorSpec  │  │ trait AggregatorFactory  │  │ enum PostAggregator    │      │
│  │ • type / name          │  │ • initialize()           │  │ • fieldAccess          │      │
│  │ • field_name           │  │ • accumulate()           │  │ • constant             │      │
│  │ • params               │  │ • combine()              │  │ • arithmetic           │      │
│  └────────────────────────┘  │ • finalize()             │  │ • quantile(s)          │      │
│                               │ • combining_factory()    │  │ • min / max            │      │
│                               └──────────────────────────┘  └────────────────────────┘      │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── STORAGE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────┐  ┌──────────────────────────┐  ┌────────────────────────┐      │
│  │ struct SegmentBuilder  │  │ struct QueryableSegment  │  │ trait SegmentStore     │      │
│  │ • pool: rayon pool     │  │ • inner: Arc<Columns>    │  │ • write() / read()     │      │
│  │ build() / persist()    │  │ • time: TimeColumn       │  │ • exists() / load()    │      │
│  └────────────────────────┘  │ • dimensions: Vec<Dim>   │  │ FileSegmentStore       │      │
│                               │ • metrics: Vec<Metric>   │  │ MemorySegmentStore     │      │
│  ┌────────────────────────┐  └──────────────────────────┘  └────────────────────────┘      │
│  │ struct DimensionColumn │                                                                 │
│  │ • dictionary (fst)     │  ┌──────────────────────────┐  ┌────────────────────────┐      │
│  │ • offsets / codes      │  │ struct SegmentData       │  │ struct SegmentHeader   │      │
│  │ • bitmaps: Roaring     │  │ • metadata               │  │ • magic / version      │      │
│  │ • nulls: Roaring       │  │ • time (delta varints)   │  │ • compression          │      │
│  └────────────────────────┘  │ • dimensions / metrics   │  │ • crc32 / payload_len  │      │
│                               └──────────────────────────┘  └────────────────────────┘      │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── QUERY LAYER ───────────────────────────────────────────┐
│                                                                                              │
│  ┌─────────────────────┐  ┌──────────────────────┐  ┌────────────────────────────┐        │
│  │ enum Query          │  │ enum DimFilter       │  │ struct QueryDispatcher<W>  │        │
│  │ • GroupBy           │  │ • Selector / In      │  │ • engines: [Option<Box<    │        │
│  │ • TopN              │  │ • Bound / Regex      │  │     dyn QueryEngine>>; 7]  │        │
│  │ • TimeSeries        │  │ • Search             │  │ • context: QueryContext    │        │
│  │ • Search            │  │ • And / Or / Not     │  │ • watcher: W               │        │
│  │ • TimeBoundary      │  │ • True               │  └────────────────────────────┘        │
│  │ • SegmentMetadata   │  └──────────────────────┘                                        │
│  │ • Select            │  ┌──────────────────────┐  ┌────────────────────────────┐        │
│  └─────────────────────┘  │ enum Granularity     │  │ struct Sequence            │        │
│                           │ • All / None         │  │ • rows: Box<dyn Iterator>  │        │
│                           │ • Second .. Year     │  │ struct ResultRow           │        │
│                           │ • Duration(ms)       │  │ • timestamp / event        │        │
│                           └──────────────────────┘  └────────────────────────────┘        │
│                                                                                              │
│  Engines: GroupBy ─ TopN ─ TimeSeries ─ Search ─ TimeBoundary ─ SegmentMetadata ─ Select    │
│  shared: candidate_rows() → bucketize() → Grouper<K> → Aggregation::finish()               │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────── RELATIONSHIPS ────────────────────────────────────────────┐
│                                                                                              │
│  RowSource ──feeds──> IncrementalIndex ──seal──> SealedIndex ──build──> QueryableSegment    │
│                              │                                                │             │
│                              └──uses──> DimensionDictionary                   │             │
│                                                                                │             │
│  SegmentBuilder ──persist──> SegmentStore ──load──> QueryableSegment <─────────┘             │
│                                                                                              │
│  QueryDispatcher ──dispatch──> QueryEngine ──reads──> QueryableSegment                      │
│        │                            │                                                        │
│        └──notifies──> QueryWatcher  └──yields──> Sequence<ResultRow>                        │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
