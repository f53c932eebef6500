use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use crate::aggregation::factory::AggregatorFactory;
use crate::aggregation::post::{apply_post_aggregators, PostAggregator};
use crate::aggregation::registry::{AggregatorRegistry, AggregatorSpec};
use crate::aggregation::value::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::column::{DimensionColumn, MetricColumn};
use crate::storage::segment_reader::QueryableSegment;

/// Segment column an aggregator reads from
#[derive(Debug, Clone, Copy)]
pub enum ColumnInput<'a> {
    Metric(&'a MetricColumn),
    /// Dimension values parsed as raw input
    Dimension(&'a DimensionColumn),
    Missing,
}

impl<'a> ColumnInput<'a> {
    /// Metric columns win over dimensions of the same name
    pub fn resolve(segment: &'a QueryableSegment, field: Option<&str>) -> Self {
        let Some(field) = field else { return ColumnInput::Missing };
        if let Some(metric) = segment.metric(field) {
            ColumnInput::Metric(metric)
        } else if let Some(dimension) = segment.dimension(field) {
            ColumnInput::Dimension(dimension)
        } else {
            ColumnInput::Missing
        }
    }

    pub fn value_at(&self, row: u32) -> Cow<'a, Value> {
        match *self {
            ColumnInput::Metric(column) => match column.get(row) {
                Some(value) => Cow::Borrowed(value),
                None => Cow::Owned(Value::Null),
            },
            ColumnInput::Dimension(column) => Cow::Owned(dimension_value(column, row)),
            ColumnInput::Missing => Cow::Owned(Value::Null),
        }
    }
}

/// Row value of a dimension as a result cell: null, one string, or a list
pub fn dimension_value(column: &DimensionColumn, row: u32) -> Value {
    let mut values = column.row_values(row);
    match values.len() {
        0 => Value::Null,
        1 => Value::Text(values.remove(0).to_string()),
        _ => Value::TextList(values.into_iter().map(String::from).collect()),
    }
}

/// Query-time aggregators bound to the segment columns they read
pub struct Aggregation<'a> {
    pub factories: Vec<Box<dyn AggregatorFactory>>,
    inputs: Vec<ColumnInput<'a>>,
}

impl<'a> Aggregation<'a> {
    pub fn new(specs: &[AggregatorSpec], segment: &'a QueryableSegment, registry: &AggregatorRegistry) -> Result<Self> {
        let factories = registry.build_all(specs)?;
        let inputs = factories.iter().map(|f| ColumnInput::resolve(segment, f.field_name())).collect();
        Ok(Aggregation { factories, inputs })
    }

    pub fn initial_states(&self) -> Vec<Value> {
        self.factories.iter().map(|f| f.initialize()).collect()
    }

    pub fn accumulate(&self, states: &mut [Value], row: u32) -> Result<()> {
        for ((factory, input), state) in self.factories.iter().zip(&self.inputs).zip(states.iter_mut()) {
            factory.accumulate(state, &input.value_at(row))?;
        }
        Ok(())
    }

    /// Whether an aggregator or post-aggregator produces `name`
    pub fn has_output(&self, name: &str, post_aggregators: &[PostAggregator]) -> bool {
        self.factories.iter().any(|f| f.name() == name) || post_aggregators.iter().any(|p| p.name() == name)
    }

    /// Finalized aggregator values plus post-aggregators, added to `event`
    pub fn finish(
        &self,
        states: &[Value],
        post_aggregators: &[PostAggregator],
        event: &mut BTreeMap<String, Value>,
    ) -> Result<()> {
        for (factory, state) in self.factories.iter().zip(states) {
            event.insert(factory.name().to_string(), factory.finalize(state));
        }
        apply_post_aggregators(post_aggregators, event)
    }
}

/// Hash grouping of rows by key, keeping first-seen key order
pub struct Grouper<'s, 'a, K> {
    aggregation: &'s Aggregation<'a>,
    positions: HashMap<K, usize>,
    groups: Vec<(K, Vec<Value>)>,
    max_groups: usize,
}

impl<'s, 'a, K: Eq + Hash + Clone> Grouper<'s, 'a, K> {
    pub fn new(aggregation: &'s Aggregation<'a>, max_groups: usize) -> Self {
        Grouper {
            aggregation,
            positions: HashMap::new(),
            groups: Vec::new(),
            max_groups,
        }
    }

    /// Adds `row` to the group of `key`, creating it if needed
    pub fn add(&mut self, key: K, row: u32) -> Result<()> {
        let position = match self.positions.get(&key) {
            Some(&position) => position,
            None => {
                if self.groups.len() >= self.max_groups {
                    return Err(Error::new(
                        ErrorKind::CapacityExceeded,
                        format!("Grouping exceeded {} intermediate rows", self.max_groups),
                    ));
                }
                self.positions.insert(key.clone(), self.groups.len());
                self.groups.push((key, self.aggregation.initial_states()));
                self.groups.len() - 1
            }
        };
        self.aggregation.accumulate(&mut self.groups[position].1, row)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in first-seen order
    pub fn into_groups(self) -> Vec<(K, Vec<Value>)> {
        self.groups
    }
}

/// Grouping keys of one row; multi-value dimensions fan out into one key
/// per value. Unknown dimensions are null.
pub fn group_keys(dimensions: &[Option<&DimensionColumn>], row: u32) -> Vec<Vec<Option<u32>>> {
    let mut keys = vec![Vec::with_capacity(dimensions.len())];
    for dimension in dimensions {
        let codes: &[u32] = dimension.map(|c| c.row_codes(row)).unwrap_or(&[]);
        if codes.len() <= 1 {
            let code = codes.first().copied();
            for key in &mut keys {
                key.push(code);
            }
        } else {
            keys = keys
                .into_iter()
                .flat_map(|key| {
                    codes.iter().map(move |&code| {
                        let mut key = key.clone();
                        key.push(Some(code));
                        key
                    })
                })
                .collect();
        }
    }
    keys
}

/// Decoded cell for a grouping code
pub fn decode(dimension: Option<&DimensionColumn>, code: Option<u32>) -> Value {
    match (dimension, code) {
        (Some(column), Some(code)) => column.dictionary.value(code).map(Value::from).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
