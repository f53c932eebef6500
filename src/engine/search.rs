use std::collections::BTreeMap;
use tracing::debug;
use crate::aggregation::value::Value;
use crate::core::error::{Error, Result};
use crate::engine::cursor::{all_bucket_timestamp, candidate_rows};
use crate::query::ast::{Query, SearchSortSpec};
use crate::query::dispatcher::{QueryContext, QueryEngine, QueryKind};
use crate::query::results::{ResultRow, Sequence};
use crate::storage::segment_reader::QueryableSegment;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchHit {
    dimension: String,
    value: String,
    count: u64,
}

/// Distinct dimension values matching a search spec among candidate rows
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchEngine;

impl QueryEngine for SearchEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::Search
    }

    fn run(&self, query: &Query, segment: &QueryableSegment, ctx: &QueryContext) -> Result<Sequence> {
        let Query::Search(query) = query else {
            return Err(Error::unsupported_query(format!("search engine cannot run {}", query.kind())));
        };

        // Compile first so a bad pattern fails before scanning
        query.query.matcher()?;
        let rows = candidate_rows(segment, &query.intervals, query.filter.as_ref())?;

        let columns: Vec<_> = if query.search_dimensions.is_empty() {
            segment.dimensions().iter().collect()
        } else {
            query.search_dimensions.iter().filter_map(|d| segment.dimension(d)).collect()
        };

        let mut hits = Vec::new();
        for column in columns {
            for code in query.query.matching_codes(column)? {
                let count = column.bitmap(code).map(|b| b.intersection_len(&rows)).unwrap_or(0);
                if count == 0 {
                    continue;
                }
                if let Some(value) = column.dictionary.value(code) {
                    hits.push(SearchHit { dimension: column.name.clone(), value: value.to_string(), count });
                }
            }
        }

        match query.sort {
            SearchSortSpec::Lexicographic => {
                hits.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.dimension.cmp(&b.dimension)))
            }
            SearchSortSpec::Strlen => hits.sort_by(|a, b| {
                a.value.len().cmp(&b.value.len())
                    .then_with(|| a.value.cmp(&b.value))
                    .then_with(|| a.dimension.cmp(&b.dimension))
            }),
        }
        hits.truncate(query.limit.unwrap_or(ctx.search_limit));
        debug!(segment = %segment.id(), hits = hits.len(), "search finished");

        let timestamp = all_bucket_timestamp(segment, &query.intervals);
        let results = hits.into_iter().map(move |hit| {
            let mut event = BTreeMap::new();
            event.insert("dimension".to_string(), Value::Text(hit.dimension));
            event.insert("value".to_string(), Value::Text(hit.value));
            event.insert("count".to_string(), Value::Long(hit.count as i64));
            ResultRow::new(timestamp, event)
        });
        Ok(Sequence::new(results))
    }
}
