use std::collections::HashMap;
use tracing::{debug, warn};
use crate::aggregation::factory::AggregatorFactory;
use crate::aggregation::registry::AggregatorRegistry;
use crate::aggregation::value::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Record, Timestamp};
use crate::index::dictionary::DimensionDictionary;
use crate::schema::schema::IndexSchema;

/// Grouping key of one incremental row. `dims[i]` holds the sorted codes of
/// dimension `i`; an empty list is null. Trailing nulls are trimmed so keys
/// stay equal when a schemaless index discovers new dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub timestamp: Timestamp,
    pub dims: Vec<Vec<u32>>,
}

impl RowKey {
    pub fn codes(&self, dimension: usize) -> &[u32] {
        self.dims.get(dimension).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Mutable roll-up index: one row per (truncated timestamp, dimension codes).
///
/// Single writer. When `max_rows` distinct keys exist, the next record that
/// would create a new key is rejected with `CapacityExceeded` and the index
/// stays full: every later `add` is rejected too, while existing rows are
/// kept intact for `seal`.
pub struct IncrementalIndex {
    schema: IndexSchema,
    factories: Vec<Box<dyn AggregatorFactory>>,
    dimensions: Vec<String>,
    positions: HashMap<String, usize>,
    dictionaries: Vec<DimensionDictionary>,
    rows: HashMap<RowKey, usize>,
    entries: Vec<(RowKey, Vec<Value>)>,
    max_rows: usize,
    full: bool,
    events: u64,
}

impl IncrementalIndex {
    pub fn new(schema: IndexSchema, registry: &AggregatorRegistry, max_rows: usize) -> Result<Self> {
        schema.validate()?;
        let factories = registry.build_all(&schema.metrics)?;

        let mut index = IncrementalIndex {
            schema,
            factories,
            dimensions: Vec::new(),
            positions: HashMap::new(),
            dictionaries: Vec::new(),
            rows: HashMap::new(),
            entries: Vec::new(),
            max_rows,
            full: false,
            events: 0,
        };
        let declared = index.schema.dimensions_spec.dimensions.clone();
        for dimension in &declared {
            index.register_dimension(dimension);
        }
        Ok(index)
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.entries.len()
    }

    /// Records successfully added, including those merged into existing rows
    pub fn event_count(&self) -> u64 {
        self.events
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn dimension_names(&self) -> &[String] {
        &self.dimensions
    }

    pub fn dictionary(&self, dimension: &str) -> Option<&DimensionDictionary> {
        self.positions.get(dimension).map(|&i| &self.dictionaries[i])
    }

    /// Truncated timestamp a record is stored under
    pub fn truncate(&self, ts: Timestamp) -> Timestamp {
        self.schema.granularity.truncate(ts).max(self.schema.min_timestamp)
    }

    /// Adds one record; returns the number of rows afterwards.
    /// Errors leave the index unchanged.
    pub fn add(&mut self, record: &Record) -> Result<usize> {
        if self.full {
            return Err(self.capacity_error());
        }

        let dimension_values = self.dimension_values(record)?;
        let delta = self.aggregate_record(record)?;
        let timestamp = self.truncate(record.timestamp);

        // Probe without encoding so a rejected record leaves no dictionary entries
        let existing = self.probe(timestamp, &dimension_values);
        if existing.is_none() && self.entries.len() >= self.max_rows {
            self.full = true;
            warn!(max_rows = self.max_rows, "incremental index full, rejecting further rows");
            return Err(self.capacity_error());
        }

        match existing {
            Some(row) => {
                let states = &mut self.entries[row].1;
                for (factory, (state, value)) in self.factories.iter().zip(states.iter_mut().zip(&delta)) {
                    factory.combine(state, value);
                }
            }
            None => {
                let key = self.encode_key(timestamp, &dimension_values);
                self.rows.insert(key.clone(), self.entries.len());
                self.entries.push((key, delta));
            }
        }

        self.events += 1;
        Ok(self.entries.len())
    }

    /// Hands the rows over for segment building; the index cannot be used afterwards.
    pub fn seal(self) -> SealedIndex {
        debug!(rows = self.entries.len(), events = self.events, "sealing incremental index");
        SealedIndex {
            schema: self.schema,
            factories: self.factories,
            dimensions: self.dimensions,
            dictionaries: self.dictionaries,
            rows: self.entries,
        }
    }

    fn capacity_error(&self) -> Error {
        Error::new(
            ErrorKind::CapacityExceeded,
            format!("Incremental index holds the maximum of {} rows", self.max_rows),
        )
    }

    fn register_dimension(&mut self, dimension: &str) -> usize {
        if let Some(&i) = self.positions.get(dimension) {
            return i;
        }
        let i = self.dimensions.len();
        self.dimensions.push(dimension.to_string());
        self.positions.insert(dimension.to_string(), i);
        self.dictionaries.push(DimensionDictionary::new());
        i
    }

    /// (dimension name, sorted distinct non-empty values) for every kept dimension
    fn dimension_values(&self, record: &Record) -> Result<Vec<(String, Vec<String>)>> {
        let spec = &self.schema.dimensions_spec;
        let names: Vec<&String> = if spec.is_explicit() {
            if let Some(unknown) = record.dimensions.iter().find(|d| {
                !self.positions.contains_key(d.as_str()) && !spec.is_excluded(d)
            }) {
                return Err(Error::schema_mismatch(format!("Undeclared dimension '{}'", unknown)));
            }
            spec.dimensions.iter().collect()
        } else {
            record.dimensions.iter().filter(|d| !spec.is_excluded(d)).collect()
        };

        Ok(names.into_iter().map(|name| {
            let mut values: Vec<String> = record.dimension_values(name)
                .into_iter()
                .filter(|v| !v.is_empty())
                .collect();
            values.sort();
            values.dedup();
            (name.clone(), values)
        }).collect())
    }

    /// Fresh aggregator states holding only this record's contribution
    fn aggregate_record(&self, record: &Record) -> Result<Vec<Value>> {
        self.factories.iter().map(|factory| {
            let input = factory.field_name()
                .and_then(|field| record.raw(field))
                .map(Value::from_field)
                .unwrap_or(Value::Null);
            let mut state = factory.initialize();
            factory.accumulate(&mut state, &input)?;
            Ok(state)
        }).collect()
    }

    fn probe(&self, timestamp: Timestamp, dimension_values: &[(String, Vec<String>)]) -> Option<usize> {
        let mut dims = vec![Vec::new(); self.dimensions.len()];
        for (name, values) in dimension_values {
            if values.is_empty() {
                continue;
            }
            let i = *self.positions.get(name)?;
            let dictionary = &self.dictionaries[i];
            let mut codes = values.iter().map(|v| dictionary.lookup(v)).collect::<Option<Vec<u32>>>()?;
            codes.sort_unstable();
            dims[i] = codes;
        }
        self.rows.get(&trimmed(RowKey { timestamp, dims })).copied()
    }

    fn encode_key(&mut self, timestamp: Timestamp, dimension_values: &[(String, Vec<String>)]) -> RowKey {
        for (name, values) in dimension_values {
            if !values.is_empty() && !self.positions.contains_key(name) {
                debug!(dimension = %name, "discovered dimension");
                self.register_dimension(name);
            }
        }

        let mut dims = vec![Vec::new(); self.dimensions.len()];
        for (name, values) in dimension_values {
            let Some(&i) = self.positions.get(name) else { continue };
            let dictionary = &mut self.dictionaries[i];
            let mut codes: Vec<u32> = values.iter().map(|v| dictionary.encode(v)).collect();
            codes.sort_unstable();
            dims[i] = codes;
        }
        trimmed(RowKey { timestamp, dims })
    }
}

fn trimmed(mut key: RowKey) -> RowKey {
    while key.dims.last().is_some_and(Vec::is_empty) {
        key.dims.pop();
    }
    key
}

/// Immutable hand-off from `IncrementalIndex::seal` to the segment builder
pub struct SealedIndex {
    pub schema: IndexSchema,
    pub factories: Vec<Box<dyn AggregatorFactory>>,
    pub dimensions: Vec<String>,
    pub dictionaries: Vec<DimensionDictionary>,
    pub rows: Vec<(RowKey, Vec<Value>)>,
}

impl SealedIndex {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::registry::AggregatorSpec;
    use crate::query::granularity::Granularity;
    use crate::schema::schema::DimensionsSpec;

    fn schema() -> IndexSchema {
        IndexSchema::new(
            DimensionsSpec::explicit(&["colo", "URL"]),
            vec![
                AggregatorSpec::long_sum("agg_count", "count"),
                AggregatorSpec::double_max("agg_max", "max"),
            ],
        ).with_granularity(Granularity::All)
    }

    fn record(ts: i64, url: &str, count: i64, max: f64) -> Record {
        Record::new(ts, vec!["colo".into(), "URL".into()])
            .with("colo", "sjc")
            .with("URL", url)
            .with("count", count)
            .with("max", max)
    }

    fn index(max_rows: usize) -> IncrementalIndex {
        IncrementalIndex::new(schema(), &AggregatorRegistry::default(), max_rows).unwrap()
    }

    #[test]
    fn same_key_rolls_up() {
        let mut index = index(usize::MAX);
        index.add(&record(10, "abc", 2, 5.0)).unwrap();
        index.add(&record(99, "abc", 3, 7.0)).unwrap();
        index.add(&record(50, "xyz", 1, 1.0)).unwrap();
        assert_eq!(index.row_count(), 2);
        assert_eq!(index.event_count(), 3);

        let sealed = index.seal();
        let (key, states) = &sealed.rows[0];
        assert_eq!(key.timestamp, 0);
        assert_eq!(states, &vec![Value::Long(5), Value::Double(7.0)]);
    }

    #[test]
    fn multi_values_are_sorted_and_deduped() {
        let mut index = index(usize::MAX);
        let tagged = |values: Vec<&str>| {
            Record::new(1, vec!["URL".into()])
                .with("URL", values.into_iter().map(String::from).collect::<Vec<_>>())
                .with("count", 1i64)
        };
        index.add(&tagged(vec!["b", "a", "b"])).unwrap();
        index.add(&tagged(vec!["a", "b"])).unwrap();
        assert_eq!(index.row_count(), 1);
        assert_eq!(index.dictionary("URL").unwrap().len(), 2);
    }

    #[test]
    fn bad_metric_leaves_index_untouched() {
        let mut index = index(usize::MAX);
        let bad = Record::new(1, vec!["URL".into()]).with("URL", "new").with("count", "lots");
        let err = index.add(&bad).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaMismatch);
        assert!(!err.is_fatal_to_batch());
        assert_eq!(index.row_count(), 0);
        assert!(index.dictionary("URL").unwrap().is_empty());
    }

    #[test]
    fn undeclared_dimension_is_a_mismatch() {
        let mut index = index(usize::MAX);
        let record = Record::new(1, vec!["pool".into()]).with("pool", "r1cart");
        assert_eq!(index.add(&record).unwrap_err().kind, ErrorKind::SchemaMismatch);
    }

    #[test]
    fn capacity_is_sticky() {
        let mut index = index(1);
        index.add(&record(1, "abc", 1, 1.0)).unwrap();
        let err = index.add(&record(1, "xyz", 1, 1.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapacityExceeded);
        assert!(err.is_fatal_to_batch());
        // Even a record for an existing key is refused once full
        assert!(index.add(&record(1, "abc", 1, 1.0)).is_err());
        assert!(index.is_full());
        assert_eq!(index.dictionary("URL").unwrap().len(), 1);
        assert_eq!(index.seal().row_count(), 1);
    }

    #[test]
    fn min_timestamp_clamps_truncation() {
        let schema = schema().with_granularity(Granularity::Hour).with_min_timestamp(7_200_000);
        let index = IncrementalIndex::new(schema, &AggregatorRegistry::default(), 10).unwrap();
        assert_eq!(index.truncate(3_600_500), 7_200_000);
        assert_eq!(index.truncate(10_900_000), 10_800_000);
    }

    #[test]
    fn schemaless_keys_survive_new_dimensions() {
        let schema = IndexSchema::new(DimensionsSpec::schemaless(), vec![AggregatorSpec::count("rows")]);
        let mut index = IncrementalIndex::new(schema, &AggregatorRegistry::default(), 10).unwrap();
        index.add(&Record::new(1, vec!["a".into()]).with("a", "x")).unwrap();
        index.add(&Record::new(1, vec!["a".into(), "b".into()]).with("a", "y").with("b", "z")).unwrap();
        index.add(&Record::new(1, vec!["a".into()]).with("a", "x")).unwrap();
        assert_eq!(index.row_count(), 2);
        assert_eq!(index.dimension_names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(index.seal().rows[0].1, vec![Value::Long(2)]);
    }
}
