use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::sync::Arc;
use crate::aggregation::value::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Interval, Timestamp};
use crate::storage::column::{DimensionColumn, MetricColumn, TimeColumn};
use crate::storage::segment::{SegmentData, SegmentId, SegmentMetadata};

struct SegmentColumns {
    metadata: SegmentMetadata,
    time: TimeColumn,
    dimensions: Vec<DimensionColumn>,
    metrics: Vec<MetricColumn>,
    dimension_positions: HashMap<String, usize>,
    metric_positions: HashMap<String, usize>,
    size_bytes: u64,
}

/// Read-only handle over an immutable segment. Cloning is cheap and clones
/// share the same columns, so any number of queries may read concurrently.
#[derive(Clone)]
pub struct QueryableSegment {
    inner: Arc<SegmentColumns>,
}

impl std::fmt::Debug for QueryableSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryableSegment")
            .field("id", &self.inner.metadata.id)
            .field("rows", &self.row_count())
            .field("dimensions", &self.inner.metadata.dimensions)
            .finish()
    }
}

impl QueryableSegment {
    pub fn new(
        metadata: SegmentMetadata,
        time: TimeColumn,
        dimensions: Vec<DimensionColumn>,
        metrics: Vec<MetricColumn>,
        size_bytes: u64,
    ) -> Result<Self> {
        let rows = time.len();
        if rows != metadata.row_count as usize {
            return Err(Error::corrupted(format!(
                "Time column has {} rows, metadata says {}",
                rows, metadata.row_count
            )));
        }
        if let Some(column) = dimensions.iter().find(|d| d.row_count() != rows) {
            return Err(Error::corrupted(format!("Dimension '{}' row count mismatch", column.name)));
        }
        if let Some(column) = metrics.iter().find(|m| m.values.len() != rows) {
            return Err(Error::corrupted(format!("Metric '{}' row count mismatch", column.name)));
        }

        let dimension_positions = dimensions.iter().enumerate().map(|(i, d)| (d.name.clone(), i)).collect();
        let metric_positions = metrics.iter().enumerate().map(|(i, m)| (m.name.clone(), i)).collect();

        Ok(QueryableSegment {
            inner: Arc::new(SegmentColumns {
                metadata,
                time,
                dimensions,
                metrics,
                dimension_positions,
                metric_positions,
                size_bytes,
            }),
        })
    }

    /// Rehydrates a persisted segment; `size_bytes` is its stored size
    pub fn from_data(data: SegmentData, size_bytes: u64) -> Result<Self> {
        let rows = data.metadata.row_count as usize;
        let time = TimeColumn::decode(&data.time)?;
        let dimensions = data.dimensions
            .into_iter()
            .map(|d| DimensionColumn::from_data(d, rows))
            .collect::<Result<Vec<_>>>()?;
        let metrics = data.metrics
            .into_iter()
            .map(|m| MetricColumn::from_data(m, rows))
            .collect::<Result<Vec<_>>>()?;
        Self::new(data.metadata, time, dimensions, metrics, size_bytes)
    }

    pub fn to_data(&self) -> Result<SegmentData> {
        Ok(SegmentData {
            metadata: self.inner.metadata.clone(),
            time: self.inner.time.encode(),
            dimensions: self.inner.dimensions.iter().map(DimensionColumn::to_data).collect::<Result<Vec<_>>>()?,
            metrics: self.inner.metrics.iter().map(MetricColumn::to_data).collect(),
        })
    }

    pub fn id(&self) -> SegmentId {
        self.inner.metadata.id
    }

    pub fn metadata(&self) -> &SegmentMetadata {
        &self.inner.metadata
    }

    pub fn row_count(&self) -> usize {
        self.inner.time.len()
    }

    pub fn size_bytes(&self) -> u64 {
        self.inner.size_bytes
    }

    /// (min, max) row timestamp, `None` for an empty segment
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.inner.time.min()?, self.inner.time.max()?))
    }

    pub fn interval(&self) -> Interval {
        self.inner.metadata.interval
    }

    pub fn dimension_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.dimensions.iter().map(|d| d.name.as_str())
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.metrics.iter().map(|m| m.name.as_str())
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionColumn> {
        self.inner.dimension_positions.get(name).map(|&i| &self.inner.dimensions[i])
    }

    pub fn dimensions(&self) -> &[DimensionColumn] {
        &self.inner.dimensions
    }

    pub fn metric(&self, name: &str) -> Option<&MetricColumn> {
        self.inner.metric_positions.get(name).map(|&i| &self.inner.metrics[i])
    }

    pub fn metrics(&self) -> &[MetricColumn] {
        &self.inner.metrics
    }

    pub fn time(&self) -> &TimeColumn {
        &self.inner.time
    }

    /// Lazy (value, code) pairs of a dimension, in sorted value order
    pub fn values_of(&self, dimension: &str) -> Result<impl Iterator<Item = (&str, u32)> + '_> {
        let column = self.dimension(dimension).ok_or_else(|| missing_dimension(dimension))?;
        Ok(column.dictionary.iter().map(|(code, value)| (value, code)))
    }

    /// Sorted row positions holding `code` in `dimension`
    pub fn rows_with(&self, dimension: &str, code: u32) -> Result<&RoaringBitmap> {
        let column = self.dimension(dimension).ok_or_else(|| missing_dimension(dimension))?;
        column.bitmap(code).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("No code {} in dimension '{}'", code, dimension))
        })
    }

    pub fn metric_at(&self, metric: &str, row: u32) -> Option<&Value> {
        self.metric(metric)?.get(row)
    }

    pub fn timestamp_at(&self, row: u32) -> Option<Timestamp> {
        self.inner.time.get(row)
    }

    /// Every row of the segment
    pub fn all_rows(&self) -> RoaringBitmap {
        let mut rows = RoaringBitmap::new();
        rows.insert_range(0..self.row_count() as u32);
        rows
    }

    /// Rows whose timestamp lies in any of `intervals`
    pub fn rows_in(&self, intervals: &[Interval]) -> RoaringBitmap {
        let mut rows = RoaringBitmap::new();
        for interval in intervals {
            rows.insert_range(self.inner.time.row_range(interval));
        }
        rows
    }
}

fn missing_dimension(dimension: &str) -> Error {
    Error::new(ErrorKind::NotFound, format!("Unknown dimension '{}'", dimension))
}
