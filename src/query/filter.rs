use regex::{Regex, RegexBuilder};
use roaring::RoaringBitmap;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};
use crate::storage::column::DimensionColumn;
use crate::storage::segment_reader::QueryableSegment;

/// How bound filters compare dimension values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundOrdering {
    #[default]
    Lexicographic,
    Numeric,
}

/// Boolean filter tree over dimension values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DimFilter {
    /// Equality; a missing or empty value selects null rows
    Selector {
        dimension: String,
        #[serde(default)]
        value: Option<String>,
    },
    In {
        dimension: String,
        values: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Bound {
        dimension: String,
        #[serde(default)]
        lower: Option<String>,
        #[serde(default)]
        upper: Option<String>,
        #[serde(default)]
        lower_strict: bool,
        #[serde(default)]
        upper_strict: bool,
        #[serde(default)]
        ordering: BoundOrdering,
    },
    Regex {
        dimension: String,
        pattern: String,
    },
    Search {
        dimension: String,
        query: SearchQuerySpec,
    },
    And {
        fields: Vec<DimFilter>,
    },
    Or {
        fields: Vec<DimFilter>,
    },
    Not {
        field: Box<DimFilter>,
    },
    True,
}

impl DimFilter {
    pub fn selector(dimension: &str, value: &str) -> Self {
        DimFilter::Selector { dimension: dimension.to_string(), value: Some(value.to_string()) }
    }

    pub fn is_null(dimension: &str) -> Self {
        DimFilter::Selector { dimension: dimension.to_string(), value: None }
    }

    pub fn in_values(dimension: &str, values: &[&str]) -> Self {
        DimFilter::In {
            dimension: dimension.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn bound(dimension: &str, lower: Option<&str>, upper: Option<&str>, ordering: BoundOrdering) -> Self {
        DimFilter::Bound {
            dimension: dimension.to_string(),
            lower: lower.map(String::from),
            upper: upper.map(String::from),
            lower_strict: false,
            upper_strict: false,
            ordering,
        }
    }

    pub fn regex(dimension: &str, pattern: &str) -> Self {
        DimFilter::Regex { dimension: dimension.to_string(), pattern: pattern.to_string() }
    }

    pub fn search(dimension: &str, query: SearchQuerySpec) -> Self {
        DimFilter::Search { dimension: dimension.to_string(), query }
    }

    pub fn and(fields: Vec<DimFilter>) -> Self {
        DimFilter::And { fields }
    }

    pub fn or(fields: Vec<DimFilter>) -> Self {
        DimFilter::Or { fields }
    }

    pub fn not(field: DimFilter) -> Self {
        DimFilter::Not { field: Box::new(field) }
    }

    /// Rows of `segment` matching this filter. Fails before touching any
    /// bitmap if a referenced dimension does not exist.
    pub fn evaluate(&self, segment: &QueryableSegment) -> Result<RoaringBitmap> {
        self.validate(segment)?;
        self.rows(segment)
    }

    /// Checks every referenced dimension and compiles every pattern
    pub fn validate(&self, segment: &QueryableSegment) -> Result<()> {
        match self {
            DimFilter::And { fields } | DimFilter::Or { fields } => {
                fields.iter().try_for_each(|f| f.validate(segment))
            }
            DimFilter::Not { field } => field.validate(segment),
            DimFilter::True => Ok(()),
            DimFilter::Regex { dimension, pattern } => {
                column(segment, dimension)?;
                Regex::new(pattern).map_err(|e| {
                    Error::filter_evaluation(format!("Bad regex on '{}': {}", dimension, e))
                })?;
                Ok(())
            }
            DimFilter::Search { dimension, query } => {
                column(segment, dimension)?;
                query.matcher().map(|_| ())
            }
            DimFilter::Selector { dimension, .. }
            | DimFilter::In { dimension, .. }
            | DimFilter::Bound { dimension, .. } => column(segment, dimension).map(|_| ()),
        }
    }

    fn rows(&self, segment: &QueryableSegment) -> Result<RoaringBitmap> {
        match self {
            DimFilter::True => Ok(segment.all_rows()),
            DimFilter::And { fields } => {
                let mut iter = fields.iter();
                let mut rows = match iter.next() {
                    Some(first) => first.rows(segment)?,
                    None => return Ok(segment.all_rows()),
                };
                for field in iter {
                    if rows.is_empty() {
                        break;
                    }
                    rows &= field.rows(segment)?;
                }
                Ok(rows)
            }
            DimFilter::Or { fields } => {
                let mut rows = RoaringBitmap::new();
                for field in fields {
                    rows |= field.rows(segment)?;
                }
                Ok(rows)
            }
            DimFilter::Not { field } => Ok(segment.all_rows() - field.rows(segment)?),
            DimFilter::Selector { dimension, value } => {
                let column = column(segment, dimension)?;
                Ok(match value.as_deref() {
                    None | Some("") => column.nulls.clone(),
                    Some(value) => column.dictionary.code(value)
                        .and_then(|code| column.bitmap(code).cloned())
                        .unwrap_or_default(),
                })
            }
            DimFilter::In { dimension, values } => {
                let column = column(segment, dimension)?;
                let mut rows = column.union_of(values.iter().filter_map(|v| column.dictionary.code(v)));
                if values.iter().any(|v| v.is_empty()) {
                    rows |= &column.nulls;
                }
                Ok(rows)
            }
            DimFilter::Bound { dimension, lower, upper, lower_strict, upper_strict, ordering } => {
                let column = column(segment, dimension)?;
                match ordering {
                    BoundOrdering::Lexicographic => {
                        let range = column.dictionary.code_range(
                            lower.as_deref().map(|v| (v, *lower_strict)),
                            upper.as_deref().map(|v| (v, *upper_strict)),
                        );
                        Ok(column.union_of(range))
                    }
                    BoundOrdering::Numeric => {
                        let lower = parse_bound(dimension, lower.as_deref())?;
                        let upper = parse_bound(dimension, upper.as_deref())?;
                        let codes = column.dictionary.iter().filter_map(|(code, value)| {
                            let v: f64 = value.trim().parse().ok()?;
                            let above = match lower {
                                Some(lo) => if *lower_strict { v > lo } else { v >= lo },
                                None => true,
                            };
                            let below = match upper {
                                Some(hi) => if *upper_strict { v < hi } else { v <= hi },
                                None => true,
                            };
                            (above && below).then_some(code)
                        });
                        Ok(column.union_of(codes))
                    }
                }
            }
            DimFilter::Regex { dimension, pattern } => {
                let column = column(segment, dimension)?;
                let regex = Regex::new(pattern)?;
                let codes = column.dictionary.iter()
                    .filter(|(_, value)| regex.is_match(value))
                    .map(|(code, _)| code);
                Ok(column.union_of(codes))
            }
            DimFilter::Search { dimension, query } => {
                let column = column(segment, dimension)?;
                Ok(column.union_of(query.matching_codes(column)?))
            }
        }
    }
}

fn column<'a>(segment: &'a QueryableSegment, dimension: &str) -> Result<&'a DimensionColumn> {
    segment.dimension(dimension).ok_or_else(|| {
        Error::filter_evaluation(format!("Filter references unknown dimension '{}'", dimension))
    })
}

fn parse_bound(dimension: &str, bound: Option<&str>) -> Result<Option<f64>> {
    bound.map(|b| {
        b.trim().parse::<f64>().map_err(|_| {
            Error::filter_evaluation(format!("Numeric bound '{}' on '{}' is not a number", b, dimension))
        })
    }).transpose()
}

/// Value predicate shared by search queries and search filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SearchQuerySpec {
    InsensitiveContains {
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    Contains {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Every fragment must occur
    #[serde(rename_all = "camelCase")]
    Fragment {
        values: Vec<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    Prefix {
        value: String,
    },
    Regex {
        pattern: String,
    },
}

impl SearchQuerySpec {
    pub fn insensitive_contains(value: &str) -> Self {
        SearchQuerySpec::InsensitiveContains { value: value.to_string() }
    }

    pub fn contains(value: &str, case_sensitive: bool) -> Self {
        SearchQuerySpec::Contains { value: value.to_string(), case_sensitive }
    }

    pub fn fragment(values: &[&str], case_sensitive: bool) -> Self {
        SearchQuerySpec::Fragment { values: values.iter().map(|v| v.to_string()).collect(), case_sensitive }
    }

    pub fn prefix(value: &str) -> Self {
        SearchQuerySpec::Prefix { value: value.to_string() }
    }

    pub fn regex(pattern: &str) -> Self {
        SearchQuerySpec::Regex { pattern: pattern.to_string() }
    }

    /// Compiled predicate; invalid patterns are a filter evaluation error
    pub fn matcher(&self) -> Result<ValueMatcher> {
        Ok(match self {
            SearchQuerySpec::InsensitiveContains { value } => ValueMatcher::Contains(vec![value.to_lowercase()], false),
            SearchQuerySpec::Contains { value, case_sensitive } => {
                ValueMatcher::Contains(vec![fold_case(value, *case_sensitive)], *case_sensitive)
            }
            SearchQuerySpec::Fragment { values, case_sensitive } => ValueMatcher::Contains(
                values.iter().map(|v| fold_case(v, *case_sensitive)).collect(),
                *case_sensitive,
            ),
            SearchQuerySpec::Prefix { value } => ValueMatcher::Prefix(value.clone()),
            SearchQuerySpec::Regex { pattern } => ValueMatcher::Regex(
                RegexBuilder::new(pattern).build().map_err(|e| {
                    Error::filter_evaluation(format!("Bad search pattern '{}': {}", pattern, e))
                })?,
            ),
        })
    }

    /// Dictionary codes of `column` whose value matches; prefixes are served from the FST
    pub fn matching_codes(&self, column: &DimensionColumn) -> Result<Vec<u32>> {
        if let SearchQuerySpec::Prefix { value } = self {
            return Ok(column.dictionary.prefix_codes(value));
        }
        let matcher = self.matcher()?;
        Ok(column.dictionary.iter().filter(|(_, v)| matcher.matches(v)).map(|(code, _)| code).collect())
    }
}

fn fold_case(value: &str, case_sensitive: bool) -> String {
    if case_sensitive { value.to_string() } else { value.to_lowercase() }
}

#[derive(Debug, Clone)]
pub enum ValueMatcher {
    /// All needles must occur; needles are pre-lowercased when case-insensitive
    Contains(Vec<String>, bool),
    Prefix(String),
    Regex(Regex),
}

impl ValueMatcher {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            ValueMatcher::Contains(needles, true) => needles.iter().all(|n| value.contains(n.as_str())),
            ValueMatcher::Contains(needles, false) => {
                let value = value.to_lowercase();
                needles.iter().all(|n| value.contains(n.as_str()))
            }
            ValueMatcher::Prefix(prefix) => value.starts_with(prefix.as_str()),
            ValueMatcher::Regex(regex) => regex.is_match(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::registry::{AggregatorRegistry, AggregatorSpec};
    use crate::core::error::ErrorKind;
    use crate::core::types::Record;
    use crate::index::incremental::IncrementalIndex;
    use crate::schema::schema::{DimensionsSpec, IndexSchema};
    use crate::storage::segment_writer::SegmentBuilder;

    /// Rows after build: (1, r1cart, 10), (2, r1search, 7), (3, r2cart, null), (4, null, 12)
    fn segment() -> QueryableSegment {
        let schema = IndexSchema::new(DimensionsSpec::explicit(&["pool", "size"]), vec![AggregatorSpec::count("rows")]);
        let mut index = IncrementalIndex::new(schema, &AggregatorRegistry::default(), 100).unwrap();
        let dims = vec!["pool".to_string(), "size".to_string()];
        index.add(&Record::new(1, dims.clone()).with("pool", "r1cart").with("size", 10i64)).unwrap();
        index.add(&Record::new(2, dims.clone()).with("pool", "r1search").with("size", 7i64)).unwrap();
        index.add(&Record::new(3, dims.clone()).with("pool", "r2cart")).unwrap();
        index.add(&Record::new(4, dims).with("size", 12i64)).unwrap();
        SegmentBuilder::new(1).unwrap().build(index.seal()).unwrap()
    }

    fn rows(filter: DimFilter) -> Vec<u32> {
        filter.evaluate(&segment()).unwrap().iter().collect()
    }

    #[test]
    fn selector_in_and_null() {
        assert_eq!(rows(DimFilter::selector("pool", "r1cart")), vec![0]);
        assert_eq!(rows(DimFilter::selector("pool", "missing")), Vec::<u32>::new());
        assert_eq!(rows(DimFilter::is_null("pool")), vec![3]);
        assert_eq!(rows(DimFilter::in_values("pool", &["r2cart", "r1cart", ""])), vec![0, 2, 3]);
    }

    #[test]
    fn boolean_combinators() {
        let cart = DimFilter::regex("pool", "cart$");
        assert_eq!(rows(DimFilter::and(vec![cart.clone(), DimFilter::selector("size", "10")])), vec![0]);
        assert_eq!(rows(DimFilter::or(vec![cart.clone(), DimFilter::is_null("pool")])), vec![0, 2, 3]);
        assert_eq!(rows(DimFilter::not(cart)), vec![1, 3]);
        assert_eq!(rows(DimFilter::and(vec![])), vec![0, 1, 2, 3]);
        assert_eq!(rows(DimFilter::True), vec![0, 1, 2, 3]);
    }

    #[test]
    fn bounds_compare_lexicographically_or_numerically() {
        // "10" < "12" < "7" as strings
        let lex = DimFilter::bound("size", Some("10"), Some("7"), BoundOrdering::Lexicographic);
        assert_eq!(rows(lex), vec![0, 1, 3]);
        let num = DimFilter::Bound {
            dimension: "size".into(),
            lower: Some("7".into()),
            upper: Some("12".into()),
            lower_strict: true,
            upper_strict: false,
            ordering: BoundOrdering::Numeric,
        };
        assert_eq!(rows(num), vec![0, 3]);
    }

    #[test]
    fn search_specs() {
        assert_eq!(rows(DimFilter::search("pool", SearchQuerySpec::prefix("r1"))), vec![0, 1]);
        assert_eq!(rows(DimFilter::search("pool", SearchQuerySpec::insensitive_contains("CART"))), vec![0, 2]);
        assert_eq!(rows(DimFilter::search("pool", SearchQuerySpec::contains("CART", true))), Vec::<u32>::new());
        assert_eq!(rows(DimFilter::search("pool", SearchQuerySpec::fragment(&["r1", "ch"], false))), vec![1]);
    }

    #[test]
    fn unknown_dimension_fails_before_evaluation() {
        let filter = DimFilter::or(vec![DimFilter::selector("pool", "r1cart"), DimFilter::selector("colo", "x")]);
        let err = filter.evaluate(&segment()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FilterEvaluation);

        let err = DimFilter::regex("pool", "(").evaluate(&segment()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FilterEvaluation);
    }

    #[test]
    fn filters_deserialize_from_tagged_json() {
        let json = r#"{"type":"and","fields":[
            {"type":"selector","dimension":"pool","value":"r1cart"},
            {"type":"not","field":{"type":"bound","dimension":"size","lower":"11","ordering":"numeric"}}
        ]}"#;
        let filter: DimFilter = serde_json::from_str(json).unwrap();
        assert_eq!(rows(filter), vec![0]);
    }
}
