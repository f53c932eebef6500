use roaring::RoaringBitmap;
use tracing::debug;
use crate::core::error::Result;
use crate::core::types::{Interval, Timestamp};
use crate::query::filter::DimFilter;
use crate::query::granularity::Granularity;
use crate::storage::segment_reader::QueryableSegment;

/// Candidate rows of one time bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub timestamp: Timestamp,
    pub rows: RoaringBitmap,
}

/// Rows inside any of `intervals` that pass `filter`. Filter errors surface
/// here, before an engine aggregates anything.
pub fn candidate_rows(
    segment: &QueryableSegment,
    intervals: &[Interval],
    filter: Option<&DimFilter>,
) -> Result<RoaringBitmap> {
    let mut rows = segment.rows_in(intervals);
    let in_time = rows.len();
    if let Some(filter) = filter {
        rows &= filter.evaluate(segment)?;
    }
    debug!(segment = %segment.id(), in_time, candidates = rows.len(), "filtered rows");
    Ok(rows)
}

/// Data interval of the segment clipped to the query intervals
pub fn clipped_intervals(segment: &QueryableSegment, intervals: &[Interval]) -> Vec<Interval> {
    let data = segment.interval();
    intervals.iter().filter_map(|i| i.intersect(&data)).collect()
}

/// Timestamp of the single `all` bucket
pub fn all_bucket_timestamp(segment: &QueryableSegment, intervals: &[Interval]) -> Timestamp {
    clipped_intervals(segment, intervals)
        .iter()
        .map(|i| i.start)
        .min()
        .unwrap_or(segment.interval().start)
}

/// Splits candidate rows into time buckets in ascending bucket order.
/// Rows are time-sorted, so each bucket is a contiguous run.
pub fn bucketize(
    segment: &QueryableSegment,
    rows: &RoaringBitmap,
    granularity: Granularity,
    intervals: &[Interval],
) -> Vec<Bucket> {
    if rows.is_empty() {
        return Vec::new();
    }
    if granularity == Granularity::All {
        return vec![Bucket { timestamp: all_bucket_timestamp(segment, intervals), rows: rows.clone() }];
    }

    let mut buckets: Vec<Bucket> = Vec::new();
    for row in rows.iter() {
        let Some(ts) = segment.timestamp_at(row) else { continue };
        let bucket = granularity.truncate(ts);
        match buckets.last_mut() {
            Some(last) if last.timestamp == bucket => {
                last.rows.insert(row);
            }
            _ => {
                let mut rows = RoaringBitmap::new();
                rows.insert(row);
                buckets.push(Bucket { timestamp: bucket, rows });
            }
        }
    }
    debug!(segment = %segment.id(), ?granularity, buckets = buckets.len(), "bucketed rows");
    buckets
}

/// Every bucket start of a period granularity between the query intervals
/// and the segment data
pub fn period_buckets(segment: &QueryableSegment, intervals: &[Interval], granularity: Granularity) -> Vec<Timestamp> {
    let mut stamps: Vec<Timestamp> = Vec::new();
    if !granularity.is_period() {
        return stamps;
    }
    for interval in clipped_intervals(segment, intervals) {
        for (stamp, _) in granularity.buckets(interval) {
            if stamps.last().is_none_or(|&last| last < stamp) {
                stamps.push(stamp);
            }
        }
    }
    stamps
}
