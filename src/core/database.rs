use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::aggregation::registry::AggregatorRegistry;
use crate::core::config::Config;
use crate::core::error::{ErrorKind, Result};
use crate::core::observer::{NoopWatcher, QueryWatcher};
use crate::index::incremental::IncrementalIndex;
use crate::load::row_source::RowSource;
use crate::query::ast::Query;
use crate::query::dispatcher::{QueryContext, QueryDispatcher};
use crate::query::results::Sequence;
use crate::schema::schema::IndexSchema;
use crate::storage::segment_reader::QueryableSegment;
use crate::storage::segment_writer::SegmentBuilder;
use crate::storage::store::{FileSegmentStore, MemorySegmentStore, SegmentStore};

/// What happened while turning a row source into a segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub records_read: u64,     // Records handed over by the source
    pub records_added: u64,    // Records folded into the index
    pub rows: usize,           // Index rows after rollup
    pub malformed: u64,        // Lines the source skipped
    pub rejected: u64,         // Records failing the schema
    pub truncated: bool,       // Row limit hit; later records were not read
    pub reused: bool,          // Segment already existed and was loaded instead
}

/// Embedded OLAP engine: ingest → build → persist → load → query
pub struct EmbeddedOlap<W: QueryWatcher = NoopWatcher> {
    config: Config,
    store: Box<dyn SegmentStore>,
    registry: Arc<AggregatorRegistry>,
    builder: SegmentBuilder,
    dispatcher: QueryDispatcher<W>,
}

impl EmbeddedOlap<NoopWatcher> {
    /// Segments persisted as files under `config.segment_dir`
    pub fn open(config: Config) -> Result<Self> {
        let store = FileSegmentStore::from_config(&config)?;
        Self::with_parts(config, Box::new(store), Arc::new(AggregatorRegistry::default()), NoopWatcher)
    }

    /// Segments kept in process memory only
    pub fn in_memory(config: Config) -> Result<Self> {
        let store = MemorySegmentStore::with_compression(config.index_spec.compression);
        Self::with_parts(config, Box::new(store), Arc::new(AggregatorRegistry::default()), NoopWatcher)
    }
}

impl<W: QueryWatcher> EmbeddedOlap<W> {
    pub fn with_parts(
        config: Config,
        store: Box<dyn SegmentStore>,
        registry: Arc<AggregatorRegistry>,
        watcher: W,
    ) -> Result<Self> {
        let builder = SegmentBuilder::from_config(&config)?;
        let context = QueryContext::new(registry.clone(), &config);
        let dispatcher = QueryDispatcher::with_watcher(context, watcher);
        Ok(EmbeddedOlap { config, store, registry, builder, dispatcher })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AggregatorRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &dyn SegmentStore {
        self.store.as_ref()
    }

    pub fn dispatcher(&self) -> &QueryDispatcher<W> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut QueryDispatcher<W> {
        &mut self.dispatcher
    }

    /// Drains `source` into a fresh incremental index.
    ///
    /// Schema mismatches skip the record; a full index stops reading. Any
    /// other error, including a failing source, aborts the batch.
    pub fn ingest<S: RowSource>(&self, source: &mut S, schema: IndexSchema) -> Result<(IncrementalIndex, IngestReport)> {
        let mut index = IncrementalIndex::new(schema, &self.registry, self.config.max_rows)?;
        let mut report = IngestReport::default();

        while let Some(record) = source.next_record() {
            let record = record?;
            report.records_read += 1;
            match index.add(&record) {
                Ok(_) => report.records_added += 1,
                Err(e) if e.kind == ErrorKind::CapacityExceeded => {
                    report.truncated = true;
                    break;
                }
                Err(e) if !e.is_fatal_to_batch() => {
                    report.rejected += 1;
                    warn!(timestamp = record.timestamp, error = %e, "record rejected");
                }
                Err(e) => return Err(e),
            }
        }

        report.malformed = source.skipped();
        report.rows = index.row_count();
        info!(
            read = report.records_read,
            added = report.records_added,
            rows = report.rows,
            malformed = report.malformed,
            rejected = report.rejected,
            truncated = report.truncated,
            "ingest finished"
        );
        Ok((index, report))
    }

    /// Segment for `location`: loaded when the store already has it,
    /// otherwise ingested from `source`, built and persisted there.
    pub fn index<S: RowSource>(
        &self,
        source: &mut S,
        schema: IndexSchema,
        location: &str,
    ) -> Result<(QueryableSegment, IngestReport)> {
        if self.store.exists(location) {
            info!(location, "segment exists, skipping ingest");
            let segment = self.store.load(location)?;
            let report = IngestReport { rows: segment.row_count(), reused: true, ..IngestReport::default() };
            return Ok((segment, report));
        }

        let (index, report) = self.ingest(source, schema)?;
        let segment = self.builder.persist(index.seal(), self.store.as_ref(), location)?;
        Ok((segment, report))
    }

    /// In-memory build without touching the store
    pub fn build(&self, index: IncrementalIndex) -> Result<QueryableSegment> {
        self.builder.build(index.seal())
    }

    pub fn load(&self, location: &str) -> Result<QueryableSegment> {
        self.store.load(location)
    }

    pub fn run(&self, query: &Query, segment: &QueryableSegment) -> Result<Sequence> {
        self.dispatcher.run(query, segment)
    }

    /// Parses a JSON query and runs it
    pub fn run_json(&self, json: &str, segment: &QueryableSegment) -> Result<Sequence> {
        self.run(&Query::from_json(json)?, segment)
    }
}
