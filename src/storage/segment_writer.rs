use chrono::Utc;
use rayon::prelude::*;
use tracing::info;
use crate::aggregation::value::Value;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Interval, Timestamp};
use crate::index::incremental::SealedIndex;
use crate::storage::column::{DimensionColumn, MetricColumn, TimeColumn};
use crate::storage::segment::{SegmentId, SegmentMetadata};
use crate::storage::segment_reader::QueryableSegment;
use crate::storage::store::SegmentStore;

/// Turns a sealed incremental index into an immutable columnar segment.
/// Column work runs on a private rayon pool.
pub struct SegmentBuilder {
    pub threads: usize,
    pool: rayon::ThreadPool,
}

struct BuildRow {
    timestamp: Timestamp,
    dims: Vec<Vec<u32>>,
    states: Vec<Value>,
}

impl SegmentBuilder {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("olapdex-build-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("Build pool: {}", e)))?;
        Ok(SegmentBuilder { threads, pool })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.build_threads)
    }

    /// In-memory build: sorted dictionaries, canonical row order, bitmap
    /// indexes and finalized metric columns.
    pub fn build(&self, sealed: SealedIndex) -> Result<QueryableSegment> {
        let SealedIndex { schema, factories, dimensions, dictionaries, rows } = sealed;
        if rows.len() > u32::MAX as usize {
            return Err(Error::new(
                ErrorKind::CapacityExceeded,
                format!("{} rows do not fit in one segment", rows.len()),
            ));
        }

        let frozen = self.pool.install(|| {
            dictionaries.par_iter().map(|d| d.freeze()).collect::<Result<Vec<_>>>()
        })?;

        let mut rows: Vec<BuildRow> = rows.into_iter().map(|(key, states)| {
            let dims = frozen.iter().enumerate().map(|(i, (_, remap))| {
                let mut codes: Vec<u32> = key.codes(i).iter().map(|&c| remap[c as usize]).collect();
                codes.sort_unstable();
                codes
            }).collect();
            BuildRow { timestamp: key.timestamp, dims, states }
        }).collect();

        self.pool.install(|| {
            rows.par_sort_unstable_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.dims.cmp(&b.dims)))
        });

        let dimension_columns: Vec<DimensionColumn> = self.pool.install(|| {
            frozen.into_par_iter().enumerate().map(|(i, (dictionary, _))| {
                let row_codes: Vec<&[u32]> = rows.iter().map(|r| r.dims[i].as_slice()).collect();
                DimensionColumn::from_rows(&dimensions[i], dictionary, &row_codes)
            }).collect()
        });

        let metric_columns: Vec<MetricColumn> = self.pool.install(|| {
            factories.par_iter().enumerate().map(|(m, factory)| MetricColumn {
                name: factory.name().to_string(),
                type_name: factory.type_name().to_string(),
                values: rows.iter().map(|r| factory.finalize(&r.states[m])).collect(),
            }).collect()
        });

        let time = TimeColumn { values: rows.iter().map(|r| r.timestamp).collect() };
        let interval = match (time.min(), time.max()) {
            (Some(min), Some(max)) => Interval::new(min, max.saturating_add(1)),
            _ => Interval::new(schema.min_timestamp, schema.min_timestamp),
        };

        let metadata = SegmentMetadata {
            id: SegmentId::new(),
            created_at: Utc::now(),
            interval,
            row_count: rows.len() as u32,
            granularity: schema.granularity,
            dimensions,
            metrics: factories.iter().map(|f| f.spec()).collect(),
        };

        let size: u64 = dimension_columns.iter().map(DimensionColumn::size_estimate).sum::<u64>()
            + time.len() as u64 * 8;
        info!(
            segment = %metadata.id,
            rows = metadata.row_count,
            dimensions = dimension_columns.len(),
            metrics = metric_columns.len(),
            "built segment"
        );
        QueryableSegment::new(metadata, time, dimension_columns, metric_columns, size)
    }

    /// Builds, writes to `store` under `location`, and returns the segment as
    /// reloaded from the store. Any store failure surfaces as `BuildFailed`.
    pub fn persist(&self, sealed: SealedIndex, store: &dyn SegmentStore, location: &str) -> Result<QueryableSegment> {
        let segment = self.build(sealed)?;
        let data = segment.to_data().map_err(Error::build_failed)?;
        let written = store.write(location, &data).map_err(Error::build_failed)?;
        info!(segment = %segment.id(), location, bytes = written, "persisted segment");
        store.load(location).map_err(Error::build_failed)
    }
}
