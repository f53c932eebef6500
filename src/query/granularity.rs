use serde::{Serialize, Deserialize};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use crate::core::types::{Interval, Timestamp};

const SECOND: i64 = 1_000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
// 1970-01-01 was a Thursday; weeks start on Monday
const WEEK_ORIGIN: i64 = -3 * DAY;

/// Time bucketing used both for ingest truncation and query buckets.
/// Calendar granularities are computed in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    All,
    None,
    Second,
    Minute,
    FifteenMinute,
    ThirtyMinute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    /// Fixed-width buckets of the given millis, aligned to the epoch
    Duration(i64),
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::None
    }
}

impl Granularity {
    /// Fixed bucket width, `None` for calendar and unbounded granularities
    pub fn fixed_width(&self) -> Option<i64> {
        match self {
            Granularity::Second => Some(SECOND),
            Granularity::Minute => Some(MINUTE),
            Granularity::FifteenMinute => Some(15 * MINUTE),
            Granularity::ThirtyMinute => Some(30 * MINUTE),
            Granularity::Hour => Some(HOUR),
            Granularity::Day => Some(DAY),
            Granularity::Week => Some(WEEK),
            Granularity::Duration(ms) if *ms > 0 => Some(*ms),
            _ => None,
        }
    }

    /// Period granularities have enumerable buckets; `all` and `none` do not.
    pub fn is_period(&self) -> bool {
        !matches!(self, Granularity::All | Granularity::None)
    }

    /// Start of the bucket containing `ts`
    pub fn truncate(&self, ts: Timestamp) -> Timestamp {
        match self {
            Granularity::All => i64::MIN,
            Granularity::None => ts,
            Granularity::Week => week_floor(ts),
            Granularity::Month => calendar_floor(ts, 1).unwrap_or(ts),
            Granularity::Quarter => calendar_floor(ts, 3).unwrap_or(ts),
            Granularity::Year => calendar_floor(ts, 12).unwrap_or(ts),
            other => match other.fixed_width() {
                Some(width) => floor_to(ts, width),
                None => ts,
            },
        }
    }

    /// Start of the bucket following the one that starts at `bucket_start`
    pub fn next(&self, bucket_start: Timestamp) -> Timestamp {
        match self {
            Granularity::All => i64::MAX,
            Granularity::None => bucket_start.saturating_add(1),
            Granularity::Month => calendar_add(bucket_start, 1),
            Granularity::Quarter => calendar_add(bucket_start, 3),
            Granularity::Year => calendar_add(bucket_start, 12),
            other => bucket_start.saturating_add(other.fixed_width().unwrap_or(1)),
        }
    }

    /// Buckets overlapping `interval`, clipped to it. Only meaningful for
    /// period granularities; `all` yields the interval itself.
    pub fn buckets(&self, interval: Interval) -> BucketIter {
        BucketIter {
            granularity: *self,
            interval,
            cursor: if interval.is_empty() { None } else { Some(self.truncate(interval.start)) },
        }
    }
}

pub struct BucketIter {
    granularity: Granularity,
    interval: Interval,
    cursor: Option<Timestamp>,
}

impl Iterator for BucketIter {
    /// (bucket timestamp, clipped bucket interval)
    type Item = (Timestamp, Interval);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.cursor?;
        if start >= self.interval.end {
            self.cursor = None;
            return None;
        }
        let end = self.granularity.next(start);
        self.cursor = if end > start && end < self.interval.end { Some(end) } else { None };

        let clipped = Interval::new(start.max(self.interval.start), end.min(self.interval.end));
        let stamp = if self.granularity == Granularity::All { self.interval.start } else { start };
        Some((stamp, clipped))
    }
}

fn floor_to(ts: i64, width: i64) -> i64 {
    ts.div_euclid(width).saturating_mul(width)
}

/// Monday-aligned floor; shifting by the origin can leave the i64 range
fn week_floor(ts: Timestamp) -> Timestamp {
    let (width, origin) = (WEEK as i128, WEEK_ORIGIN as i128);
    let floored = (ts as i128 - origin).div_euclid(width) * width + origin;
    floored.max(i64::MIN as i128) as i64
}

/// First day of the `months`-aligned period containing `ts`
fn calendar_floor(ts: Timestamp, months: u32) -> Option<Timestamp> {
    let dt = DateTime::<Utc>::from_timestamp_millis(ts)?;
    let month0 = dt.month0() / months * months;
    let date = NaiveDate::from_ymd_opt(dt.year(), month0 + 1, 1)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

fn calendar_add(bucket_start: Timestamp, months: u32) -> Timestamp {
    let next = DateTime::<Utc>::from_timestamp_millis(bucket_start).and_then(|dt| {
        let total = dt.year() as i64 * 12 + dt.month0() as i64 + months as i64;
        let date = NaiveDate::from_ymd_opt(total.div_euclid(12) as i32, total.rem_euclid(12) as u32 + 1, 1)?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
    });
    next.unwrap_or(i64::MAX)
}
