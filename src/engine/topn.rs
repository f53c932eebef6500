use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use crate::aggregation::value::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::cursor::{bucketize, candidate_rows};
use crate::engine::grouper::{decode, Aggregation, Grouper};
use crate::query::ast::{Query, TopNMetricSpec};
use crate::query::dispatcher::{QueryContext, QueryEngine, QueryKind};
use crate::query::results::{ResultRow, Sequence};
use crate::storage::segment_reader::QueryableSegment;

/// Top values of one dimension per bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct TopNEngine;

/// Resolved ranking: which cell to compare and in which direction
#[derive(Debug, Clone, PartialEq)]
enum Ranking {
    Metric { name: String, descending: bool },
    Dimension { previous_stop: Option<String>, descending: bool },
}

impl Ranking {
    fn from_spec(spec: &TopNMetricSpec) -> Self {
        match spec {
            TopNMetricSpec::Numeric { metric } => Ranking::Metric { name: metric.clone(), descending: true },
            TopNMetricSpec::Lexicographic { previous_stop } => {
                Ranking::Dimension { previous_stop: previous_stop.clone(), descending: false }
            }
            TopNMetricSpec::Inverted { metric } => match Ranking::from_spec(metric) {
                Ranking::Metric { name, descending } => Ranking::Metric { name, descending: !descending },
                Ranking::Dimension { previous_stop, descending } => {
                    Ranking::Dimension { previous_stop, descending: !descending }
                }
            },
        }
    }

    fn descending(&self) -> bool {
        match self {
            Ranking::Metric { descending, .. } | Ranking::Dimension { descending, .. } => *descending,
        }
    }
}

/// Heap entry; `Greater` means a better rank. Earlier groups win ties.
struct Ranked {
    key: Value,
    seq: usize,
    descending: bool,
    row: ResultRow,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_key = if self.descending {
            self.key.compare(&other.key)
        } else {
            other.key.compare(&self.key)
        };
        by_key.then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Keeps the best `k` entries seen so far
struct TopNCollector {
    heap: BinaryHeap<Reverse<Ranked>>,
    k: usize,
}

impl TopNCollector {
    fn new(k: usize) -> Self {
        TopNCollector { heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)), k }
    }

    fn collect(&mut self, entry: Ranked) {
        if self.k == 0 {
            return;
        }
        self.heap.push(Reverse(entry));
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    /// Best first
    fn into_sorted(self) -> Vec<ResultRow> {
        self.heap.into_sorted_vec().into_iter().map(|Reverse(entry)| entry.row).collect()
    }
}

impl QueryEngine for TopNEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::TopN
    }

    fn run(&self, query: &Query, segment: &QueryableSegment, ctx: &QueryContext) -> Result<Sequence> {
        let Query::TopN(query) = query else {
            return Err(Error::unsupported_query(format!("topN engine cannot run {}", query.kind())));
        };

        let aggregation = Aggregation::new(&query.aggregations, segment, &ctx.registry)?;
        let ranking = Ranking::from_spec(&query.metric);
        if let Ranking::Metric { name, .. } = &ranking {
            if !aggregation.has_output(name, &query.post_aggregations) {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("TopN metric '{}' is not an aggregator or post-aggregator", name),
                ));
            }
        }
        let rows = candidate_rows(segment, &query.intervals, query.filter.as_ref())?;
        let column = segment.dimension(&query.dimension);

        let mut results = Vec::new();
        for bucket in bucketize(segment, &rows, query.granularity, &query.intervals) {
            let mut grouper: Grouper<'_, '_, Option<u32>> = Grouper::new(&aggregation, usize::MAX);
            for row in bucket.rows.iter() {
                let codes = column.map(|c| c.row_codes(row)).unwrap_or(&[]);
                if codes.is_empty() {
                    grouper.add(None, row)?;
                }
                for &code in codes {
                    grouper.add(Some(code), row)?;
                }
            }

            let mut collector = TopNCollector::new(query.threshold);
            for (seq, (code, states)) in grouper.into_groups().into_iter().enumerate() {
                let value = decode(column, code);
                if let Ranking::Dimension { previous_stop: Some(stop), .. } = &ranking {
                    if value.as_str().is_none_or(|v| v <= stop.as_str()) {
                        continue;
                    }
                }

                let mut event = BTreeMap::new();
                event.insert(query.dimension.clone(), value.clone());
                aggregation.finish(&states, &query.post_aggregations, &mut event)?;
                let key = match &ranking {
                    Ranking::Metric { name, .. } => event.get(name).cloned().unwrap_or(Value::Null),
                    Ranking::Dimension { .. } => value,
                };
                collector.collect(Ranked {
                    key,
                    seq,
                    descending: ranking.descending(),
                    row: ResultRow::new(bucket.timestamp, event),
                });
            }
            results.extend(collector.into_sorted());
        }
        Ok(Sequence::from_rows(results))
    }
}
