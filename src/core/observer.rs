use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use std::time::Duration;
use tracing::{debug, warn};
use crate::core::error::Error;
use crate::query::dispatcher::QueryKind;
use crate::storage::segment::SegmentId;

/// Observability hook handed to the dispatcher at construction.
/// Every method defaults to doing nothing.
pub trait QueryWatcher: Send + Sync {
    fn query_started(&self, _kind: QueryKind, _segment: SegmentId) {}

    /// Called once the engine has produced its sequence or failed
    fn query_finished(&self, _kind: QueryKind, _elapsed: Duration, _error: Option<&Error>) {}
}

/// Zero-sized default watcher
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWatcher;

impl QueryWatcher for NoopWatcher {}

/// Emits one tracing event per query
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWatcher;

impl QueryWatcher for TracingWatcher {
    fn query_started(&self, kind: QueryKind, segment: SegmentId) {
        debug!(query = kind.name(), %segment, "query started");
    }

    fn query_finished(&self, kind: QueryKind, elapsed: Duration, error: Option<&Error>) {
        match error {
            None => debug!(query = kind.name(), elapsed_us = elapsed.as_micros() as u64, "query finished"),
            Some(err) => warn!(query = kind.name(), kind = ?err.kind, error = %err.context, "query failed"),
        }
    }
}

/// Per-kind counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStats {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_latency_us: u64,
}

impl QueryStats {
    pub fn avg_latency_us(&self) -> f64 {
        let finished = self.succeeded + self.failed;
        if finished == 0 { 0.0 } else { self.total_latency_us as f64 / finished as f64 }
    }
}

/// Accumulates `QueryStats` per query kind
#[derive(Debug, Default)]
pub struct StatsWatcher {
    stats: Mutex<[QueryStats; QueryKind::COUNT]>,
}

impl StatsWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, kind: QueryKind) -> QueryStats {
        self.stats.lock()[kind.index()].clone()
    }
}

impl QueryWatcher for StatsWatcher {
    fn query_started(&self, kind: QueryKind, _segment: SegmentId) {
        self.stats.lock()[kind.index()].started += 1;
    }

    fn query_finished(&self, kind: QueryKind, elapsed: Duration, error: Option<&Error>) {
        let mut stats = self.stats.lock();
        let entry = &mut stats[kind.index()];
        entry.total_latency_us += elapsed.as_micros() as u64;
        if error.is_some() {
            entry.failed += 1;
        } else {
            entry.succeeded += 1;
        }
    }
}
