use serde::{Serialize, Deserialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use crate::aggregation::registry::AggregatorRegistry;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::observer::{NoopWatcher, QueryWatcher};
use crate::engine;
use crate::query::ast::Query;
use crate::query::results::Sequence;
use crate::storage::segment_reader::QueryableSegment;

/// Variant tag of `Query`, used to index the engine table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    GroupBy,
    TopN,
    TimeSeries,
    Search,
    TimeBoundary,
    SegmentMetadata,
    Select,
}

impl QueryKind {
    pub const COUNT: usize = 7;

    pub const ALL: [QueryKind; QueryKind::COUNT] = [
        QueryKind::GroupBy,
        QueryKind::TopN,
        QueryKind::TimeSeries,
        QueryKind::Search,
        QueryKind::TimeBoundary,
        QueryKind::SegmentMetadata,
        QueryKind::Select,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            QueryKind::GroupBy => "groupBy",
            QueryKind::TopN => "topN",
            QueryKind::TimeSeries => "timeseries",
            QueryKind::Search => "search",
            QueryKind::TimeBoundary => "timeBoundary",
            QueryKind::SegmentMetadata => "segmentMetadata",
            QueryKind::Select => "select",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-dispatcher settings every engine reads
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub registry: Arc<AggregatorRegistry>,
    pub max_intermediate_rows: usize,     // Grouping-key cap for GroupBy
    pub search_limit: usize,
}

impl QueryContext {
    pub fn new(registry: Arc<AggregatorRegistry>, config: &Config) -> Self {
        QueryContext {
            registry,
            max_intermediate_rows: config.max_intermediate_rows,
            search_limit: config.search_limit,
        }
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new(Arc::new(AggregatorRegistry::default()), &Config::default())
    }
}

/// Executes one query family against one segment
pub trait QueryEngine: Send + Sync {
    fn kind(&self) -> QueryKind;

    /// Runs `query` to completion of its aggregation pass. Errors are
    /// returned before any row is produced.
    fn run(&self, query: &Query, segment: &QueryableSegment, ctx: &QueryContext) -> Result<Sequence>;
}

/// Fixed engine table keyed by `QueryKind`, read-only once built
pub struct QueryDispatcher<W: QueryWatcher = NoopWatcher> {
    engines: [Option<Box<dyn QueryEngine>>; QueryKind::COUNT],
    context: QueryContext,
    watcher: W,
}

impl QueryDispatcher<NoopWatcher> {
    /// Dispatcher with every built-in engine
    pub fn new(context: QueryContext) -> Self {
        Self::with_watcher(context, NoopWatcher)
    }
}

impl<W: QueryWatcher> QueryDispatcher<W> {
    pub fn with_watcher(context: QueryContext, watcher: W) -> Self {
        let mut dispatcher = Self::empty(context, watcher);
        for engine in engine::default_engines() {
            dispatcher.register(engine);
        }
        dispatcher
    }

    /// Dispatcher with no engines; every query is unsupported until registered
    pub fn empty(context: QueryContext, watcher: W) -> Self {
        QueryDispatcher {
            engines: Default::default(),
            context,
            watcher,
        }
    }

    /// Installs `engine` in its slot, replacing any previous one
    pub fn register(&mut self, engine: Box<dyn QueryEngine>) {
        let slot = engine.kind().index();
        self.engines[slot] = Some(engine);
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    pub fn watcher(&self) -> &W {
        &self.watcher
    }

    pub fn dispatch(&self, query: &Query) -> Result<&dyn QueryEngine> {
        let kind = query.kind();
        self.engines[kind.index()]
            .as_deref()
            .ok_or_else(|| Error::unsupported_query(format!("No engine registered for {} queries", kind)))
    }

    pub fn run(&self, query: &Query, segment: &QueryableSegment) -> Result<Sequence> {
        let kind = query.kind();
        self.watcher.query_started(kind, segment.id());
        let started = Instant::now();
        let result = self.dispatch(query).and_then(|engine| engine.run(query, segment, &self.context));
        self.watcher.query_finished(kind, started.elapsed(), result.as_ref().err());
        result
    }
}

impl<W: QueryWatcher> fmt::Debug for QueryDispatcher<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = QueryKind::ALL.iter()
            .filter(|k| self.engines[k.index()].is_some())
            .map(|k| k.name())
            .collect();
        f.debug_struct("QueryDispatcher").field("engines", &registered).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::registry::AggregatorSpec;
    use crate::core::error::ErrorKind;
    use crate::core::observer::StatsWatcher;
    use crate::core::types::Record;
    use crate::index::incremental::IncrementalIndex;
    use crate::query::ast::{TimeBoundaryQuery, TimeSeriesQuery};
    use crate::query::results::ResultRow;
    use crate::schema::schema::{DimensionsSpec, IndexSchema};
    use crate::storage::segment_writer::SegmentBuilder;

    fn segment() -> QueryableSegment {
        let schema = IndexSchema::new(DimensionsSpec::explicit(&["host"]), vec![AggregatorSpec::count("rows")]);
        let mut index = IncrementalIndex::new(schema, &AggregatorRegistry::default(), 10).unwrap();
        index.add(&Record::new(10, vec!["host".into()]).with("host", "a")).unwrap();
        SegmentBuilder::new(1).unwrap().build(index.seal()).unwrap()
    }

    struct FixedEngine;

    impl QueryEngine for FixedEngine {
        fn kind(&self) -> QueryKind {
            QueryKind::TimeSeries
        }

        fn run(&self, _query: &Query, _segment: &QueryableSegment, _ctx: &QueryContext) -> Result<Sequence> {
            Ok(Sequence::from_rows(vec![ResultRow::new(42, Default::default())]))
        }
    }

    #[test]
    fn every_kind_has_a_default_engine() {
        let dispatcher = QueryDispatcher::new(QueryContext::default());
        let query = Query::TimeBoundary(TimeBoundaryQuery::new("test"));
        assert_eq!(dispatcher.dispatch(&query).unwrap().kind(), QueryKind::TimeBoundary);
        for kind in QueryKind::ALL {
            assert!(dispatcher.engines[kind.index()].is_some(), "{} missing", kind);
        }
    }

    #[test]
    fn empty_table_reports_unsupported() {
        let watcher = StatsWatcher::new();
        let mut dispatcher = QueryDispatcher::empty(QueryContext::default(), watcher);
        let query = Query::TimeSeries(TimeSeriesQuery::new("test"));
        let err = dispatcher.run(&query, &segment()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedQuery);
        assert_eq!(dispatcher.watcher().stats(QueryKind::TimeSeries).failed, 1);

        dispatcher.register(Box::new(FixedEngine));
        let rows = dispatcher.run(&query, &segment()).unwrap().to_vec();
        assert_eq!(rows[0].timestamp, 42);
        assert_eq!(dispatcher.watcher().stats(QueryKind::TimeSeries).succeeded, 1);
    }
}
