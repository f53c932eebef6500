use serde::{Serialize, Deserialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use crate::aggregation::post::PostAggregator;
use crate::aggregation::registry::AggregatorSpec;
use crate::aggregation::value::Value;
use crate::core::error::Result;
use crate::core::types::Interval;
use crate::query::dispatcher::QueryKind;
use crate::query::filter::{DimFilter, SearchQuerySpec};
use crate::query::granularity::Granularity;

/// Main query enum; one variant per engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "queryType", rename_all = "camelCase")]
pub enum Query {
    GroupBy(GroupByQuery),
    TopN(TopNQuery),
    #[serde(rename = "timeseries")]
    TimeSeries(TimeSeriesQuery),
    Search(SearchQuery),
    TimeBoundary(TimeBoundaryQuery),
    SegmentMetadata(SegmentMetadataQuery),
    Select(SelectQuery),
}

impl Query {
    /// Parses a structured JSON query object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Query::GroupBy(_) => QueryKind::GroupBy,
            Query::TopN(_) => QueryKind::TopN,
            Query::TimeSeries(_) => QueryKind::TimeSeries,
            Query::Search(_) => QueryKind::Search,
            Query::TimeBoundary(_) => QueryKind::TimeBoundary,
            Query::SegmentMetadata(_) => QueryKind::SegmentMetadata,
            Query::Select(_) => QueryKind::Select,
        }
    }

    pub fn data_source(&self) -> &str {
        match self {
            Query::GroupBy(q) => &q.data_source,
            Query::TopN(q) => &q.data_source,
            Query::TimeSeries(q) => &q.data_source,
            Query::Search(q) => &q.data_source,
            Query::TimeBoundary(q) => &q.data_source,
            Query::SegmentMetadata(q) => &q.data_source,
            Query::Select(q) => &q.data_source,
        }
    }

    pub fn intervals(&self) -> &[Interval] {
        match self {
            Query::GroupBy(q) => &q.intervals,
            Query::TopN(q) => &q.intervals,
            Query::TimeSeries(q) => &q.intervals,
            Query::Search(q) => &q.intervals,
            Query::TimeBoundary(q) => &q.intervals,
            Query::SegmentMetadata(q) => &q.intervals,
            Query::Select(q) => &q.intervals,
        }
    }

    pub fn filter(&self) -> Option<&DimFilter> {
        match self {
            Query::GroupBy(q) => q.filter.as_ref(),
            Query::TopN(q) => q.filter.as_ref(),
            Query::TimeSeries(q) => q.filter.as_ref(),
            Query::Search(q) => q.filter.as_ref(),
            Query::TimeBoundary(q) => q.filter.as_ref(),
            Query::Select(q) => q.filter.as_ref(),
            Query::SegmentMetadata(_) => None,
        }
    }
}

fn eternity() -> Vec<Interval> {
    vec![Interval::eternity()]
}

fn all() -> Granularity {
    Granularity::All
}

/// Group rows by dimension values within each time bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByQuery {
    pub data_source: String,
    #[serde(default = "eternity")]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub filter: Option<DimFilter>,
    #[serde(default = "all")]
    pub granularity: Granularity,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<AggregatorSpec>,
    #[serde(default)]
    pub post_aggregations: Vec<PostAggregator>,
    #[serde(default)]
    pub having: Option<HavingSpec>,
    #[serde(default)]
    pub limit_spec: Option<LimitSpec>,
}

impl GroupByQuery {
    pub fn new(data_source: &str) -> Self {
        GroupByQuery {
            data_source: data_source.to_string(),
            intervals: eternity(),
            filter: None,
            granularity: Granularity::All,
            dimensions: Vec::new(),
            aggregations: Vec::new(),
            post_aggregations: Vec::new(),
            having: None,
            limit_spec: None,
        }
    }

    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_filter(mut self, filter: DimFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_dimension(mut self, dimension: &str) -> Self {
        self.dimensions.push(dimension.to_string());
        self
    }

    pub fn with_aggregation(mut self, spec: AggregatorSpec) -> Self {
        self.aggregations.push(spec);
        self
    }

    pub fn with_post_aggregation(mut self, post: PostAggregator) -> Self {
        self.post_aggregations.push(post);
        self
    }

    pub fn with_having(mut self, having: HavingSpec) -> Self {
        self.having = Some(having);
        self
    }

    pub fn with_limit_spec(mut self, limit_spec: LimitSpec) -> Self {
        self.limit_spec = Some(limit_spec);
        self
    }
}

/// Post-grouping row predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HavingSpec {
    GreaterThan { aggregation: String, value: f64 },
    LessThan { aggregation: String, value: f64 },
    EqualTo { aggregation: String, value: f64 },
    #[serde(rename_all = "camelCase")]
    And { having_specs: Vec<HavingSpec> },
    #[serde(rename_all = "camelCase")]
    Or { having_specs: Vec<HavingSpec> },
    #[serde(rename_all = "camelCase")]
    Not { having_spec: Box<HavingSpec> },
}

impl HavingSpec {
    pub fn greater_than(aggregation: &str, value: f64) -> Self {
        HavingSpec::GreaterThan { aggregation: aggregation.to_string(), value }
    }

    pub fn less_than(aggregation: &str, value: f64) -> Self {
        HavingSpec::LessThan { aggregation: aggregation.to_string(), value }
    }

    pub fn equal_to(aggregation: &str, value: f64) -> Self {
        HavingSpec::EqualTo { aggregation: aggregation.to_string(), value }
    }

    /// Non-numeric or missing metrics never satisfy a comparison
    pub fn eval(&self, event: &BTreeMap<String, Value>) -> bool {
        let metric = |name: &str| event.get(name).and_then(Value::as_f64);
        match self {
            HavingSpec::GreaterThan { aggregation, value } => metric(aggregation).is_some_and(|m| m > *value),
            HavingSpec::LessThan { aggregation, value } => metric(aggregation).is_some_and(|m| m < *value),
            HavingSpec::EqualTo { aggregation, value } => metric(aggregation).is_some_and(|m| m == *value),
            HavingSpec::And { having_specs } => having_specs.iter().all(|h| h.eval(event)),
            HavingSpec::Or { having_specs } => having_specs.iter().any(|h| h.eval(event)),
            HavingSpec::Not { having_spec } => !having_spec.eval(event),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByColumn {
    pub dimension: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Ordering and truncation of group-by output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LimitSpec {
    #[serde(default)]
    pub columns: Vec<OrderByColumn>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl LimitSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, dimension: &str, direction: Direction) -> Self {
        self.columns.push(OrderByColumn { dimension: dimension.to_string(), direction });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Compares two result events column by column
    pub fn compare(&self, a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> Ordering {
        for column in &self.columns {
            let left = a.get(&column.dimension).unwrap_or(&Value::Null);
            let right = b.get(&column.dimension).unwrap_or(&Value::Null);
            let ord = match column.direction {
                Direction::Ascending => left.compare(right),
                Direction::Descending => right.compare(left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// How top-N ranks dimension values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TopNMetricSpec {
    /// Descending by an aggregator or post-aggregator
    Numeric { metric: String },
    /// Reverses the wrapped ordering
    Inverted { metric: Box<TopNMetricSpec> },
    /// Ascending by dimension value, starting after `previous_stop`
    #[serde(rename_all = "camelCase")]
    Lexicographic {
        #[serde(default)]
        previous_stop: Option<String>,
    },
}

impl TopNMetricSpec {
    pub fn numeric(metric: &str) -> Self {
        TopNMetricSpec::Numeric { metric: metric.to_string() }
    }

    pub fn inverted(spec: TopNMetricSpec) -> Self {
        TopNMetricSpec::Inverted { metric: Box::new(spec) }
    }

    pub fn lexicographic(previous_stop: Option<&str>) -> Self {
        TopNMetricSpec::Lexicographic { previous_stop: previous_stop.map(String::from) }
    }
}

/// Top values of a single dimension ranked by a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopNQuery {
    pub data_source: String,
    #[serde(default = "eternity")]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub filter: Option<DimFilter>,
    #[serde(default = "all")]
    pub granularity: Granularity,
    pub dimension: String,
    pub metric: TopNMetricSpec,
    pub threshold: usize,
    #[serde(default)]
    pub aggregations: Vec<AggregatorSpec>,
    #[serde(default)]
    pub post_aggregations: Vec<PostAggregator>,
}

impl TopNQuery {
    pub fn new(data_source: &str, dimension: &str, metric: TopNMetricSpec, threshold: usize) -> Self {
        TopNQuery {
            data_source: data_source.to_string(),
            intervals: eternity(),
            filter: None,
            granularity: Granularity::All,
            dimension: dimension.to_string(),
            metric,
            threshold,
            aggregations: Vec::new(),
            post_aggregations: Vec::new(),
        }
    }

    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_filter(mut self, filter: DimFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_aggregation(mut self, spec: AggregatorSpec) -> Self {
        self.aggregations.push(spec);
        self
    }

    pub fn with_post_aggregation(mut self, post: PostAggregator) -> Self {
        self.post_aggregations.push(post);
        self
    }
}

/// Aggregates per time bucket only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesQuery {
    pub data_source: String,
    #[serde(default = "eternity")]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub filter: Option<DimFilter>,
    #[serde(default = "all")]
    pub granularity: Granularity,
    #[serde(default)]
    pub aggregations: Vec<AggregatorSpec>,
    #[serde(default)]
    pub post_aggregations: Vec<PostAggregator>,
    #[serde(default)]
    pub skip_empty_buckets: bool,
}

impl TimeSeriesQuery {
    pub fn new(data_source: &str) -> Self {
        TimeSeriesQuery {
            data_source: data_source.to_string(),
            intervals: eternity(),
            filter: None,
            granularity: Granularity::All,
            aggregations: Vec::new(),
            post_aggregations: Vec::new(),
            skip_empty_buckets: false,
        }
    }

    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_filter(mut self, filter: DimFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_aggregation(mut self, spec: AggregatorSpec) -> Self {
        self.aggregations.push(spec);
        self
    }

    pub fn with_post_aggregation(mut self, post: PostAggregator) -> Self {
        self.post_aggregations.push(post);
        self
    }

    pub fn skip_empty_buckets(mut self, skip: bool) -> Self {
        self.skip_empty_buckets = skip;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchSortSpec {
    #[default]
    Lexicographic,
    Strlen,
}

/// Distinct dimension values matching a predicate, with row counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub data_source: String,
    #[serde(default = "eternity")]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub filter: Option<DimFilter>,
    /// Empty means every dimension
    #[serde(default)]
    pub search_dimensions: Vec<String>,
    pub query: SearchQuerySpec,
    #[serde(default)]
    pub sort: SearchSortSpec,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(data_source: &str, query: SearchQuerySpec) -> Self {
        SearchQuery {
            data_source: data_source.to_string(),
            intervals: eternity(),
            filter: None,
            search_dimensions: Vec::new(),
            query,
            sort: SearchSortSpec::Lexicographic,
            limit: None,
        }
    }

    pub fn with_dimension(mut self, dimension: &str) -> Self {
        self.search_dimensions.push(dimension.to_string());
        self
    }

    pub fn with_filter(mut self, filter: DimFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SearchSortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBound {
    #[serde(rename = "minTime")]
    MinTime,
    #[serde(rename = "maxTime")]
    MaxTime,
}

/// Earliest and latest timestamp of the matching rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBoundaryQuery {
    pub data_source: String,
    #[serde(default = "eternity")]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub filter: Option<DimFilter>,
    #[serde(default)]
    pub bound: Option<TimeBound>,
}

impl TimeBoundaryQuery {
    pub fn new(data_source: &str) -> Self {
        TimeBoundaryQuery {
            data_source: data_source.to_string(),
            intervals: eternity(),
            filter: None,
            bound: None,
        }
    }

    pub fn with_filter(mut self, filter: DimFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_bound(mut self, bound: TimeBound) -> Self {
        self.bound = Some(bound);
        self
    }
}

/// Which columns segment metadata analyses
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnIncluderator {
    #[default]
    All,
    None,
    List { columns: Vec<String> },
}

impl ColumnIncluderator {
    pub fn includes(&self, column: &str) -> bool {
        match self {
            ColumnIncluderator::All => true,
            ColumnIncluderator::None => false,
            ColumnIncluderator::List { columns } => columns.iter().any(|c| c == column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadataQuery {
    pub data_source: String,
    #[serde(default = "eternity")]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub to_include: ColumnIncluderator,
}

impl SegmentMetadataQuery {
    pub fn new(data_source: &str) -> Self {
        SegmentMetadataQuery {
            data_source: data_source.to_string(),
            intervals: eternity(),
            to_include: ColumnIncluderator::All,
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.to_include = ColumnIncluderator::List { columns: columns.iter().map(|c| c.to_string()).collect() };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingSpec {
    #[serde(default)]
    pub offset: usize,
    pub threshold: usize,
}

/// Raw rows, paged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectQuery {
    pub data_source: String,
    #[serde(default = "eternity")]
    pub intervals: Vec<Interval>,
    #[serde(default)]
    pub filter: Option<DimFilter>,
    /// Empty means every dimension
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Empty means every metric
    #[serde(default)]
    pub metrics: Vec<String>,
    pub paging_spec: PagingSpec,
    #[serde(default)]
    pub descending: bool,
}

impl SelectQuery {
    pub fn new(data_source: &str, threshold: usize) -> Self {
        SelectQuery {
            data_source: data_source.to_string(),
            intervals: eternity(),
            filter: None,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            paging_spec: PagingSpec { offset: 0, threshold },
            descending: false,
        }
    }

    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_filter(mut self, filter: DimFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_dimension(mut self, dimension: &str) -> Self {
        self.dimensions.push(dimension.to_string());
        self
    }

    pub fn with_metric(mut self, metric: &str) -> Self {
        self.metrics.push(metric.to_string());
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.paging_spec.offset = offset;
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_by_from_json() {
        let json = r#"{
            "queryType": "groupBy",
            "dataSource": "test",
            "intervals": [{"start": 0, "end": 1000}],
            "granularity": "none",
            "dimensions": ["URL"],
            "filter": {"type": "selector", "dimension": "pool", "value": "r1cart"},
            "aggregations": [{"type": "longSum", "name": "agg_count", "fieldName": "agg_count"}],
            "postAggregations": [{"type": "quantile", "name": "p50", "fieldName": "agg_histogram", "probability": 0.5}],
            "having": {"type": "greaterThan", "aggregation": "agg_count", "value": 1},
            "limitSpec": {"columns": [{"dimension": "agg_count", "direction": "descending"}], "limit": 10}
        }"#;
        let query = Query::from_json(json).unwrap();
        assert_eq!(query.kind(), QueryKind::GroupBy);
        assert_eq!(query.intervals(), &[Interval::new(0, 1000)]);
        let Query::GroupBy(q) = query else { panic!("expected group by") };
        assert_eq!(q.granularity, Granularity::None);
        assert_eq!(q.aggregations, vec![AggregatorSpec::long_sum("agg_count", "agg_count")]);
        assert_eq!(q.limit_spec.unwrap().columns[0].direction, Direction::Descending);
    }

    #[test]
    fn defaults_apply_to_sparse_json() {
        let query = Query::from_json(r#"{"queryType":"timeBoundary","dataSource":"t"}"#).unwrap();
        assert_eq!(query.intervals(), &[Interval::eternity()]);
        assert!(query.filter().is_none());

        let query = Query::from_json(r#"{"queryType":"timeseries","dataSource":"t"}"#).unwrap();
        assert_eq!(query.kind(), QueryKind::TimeSeries);
    }

    #[test]
    fn builders_round_trip_through_json() {
        let query = Query::TopN(
            TopNQuery::new("test", "URL", TopNMetricSpec::inverted(TopNMetricSpec::numeric("agg_count")), 5)
                .with_aggregation(AggregatorSpec::long_sum("agg_count", "agg_count")),
        );
        let json = query.to_json().unwrap();
        assert!(json.contains(r#""queryType":"topN""#));
        assert_eq!(Query::from_json(&json).unwrap(), query);
    }

    #[test]
    fn having_and_limit_compare_values() {
        let mut a = BTreeMap::new();
        a.insert("n".to_string(), Value::Long(5));
        let mut b = BTreeMap::new();
        b.insert("n".to_string(), Value::Double(7.5));

        let having = HavingSpec::And { having_specs: vec![HavingSpec::greater_than("n", 4.0), HavingSpec::less_than("n", 6.0)] };
        assert!(having.eval(&a));
        assert!(!having.eval(&b));
        assert!(!HavingSpec::equal_to("missing", 0.0).eval(&a));

        let limit = LimitSpec::new().order_by("n", Direction::Descending);
        assert_eq!(limit.compare(&a, &b), Ordering::Greater);
    }
}
