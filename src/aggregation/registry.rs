use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use crate::aggregation::factory::*;
use crate::core::error::{Error, ErrorKind, Result};

/// Declarative aggregator description, as carried by schemas and queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl AggregatorSpec {
    pub fn new(kind: &str, name: &str, field_name: Option<&str>) -> Self {
        AggregatorSpec {
            kind: kind.to_string(),
            name: name.to_string(),
            field_name: field_name.map(str::to_string),
            params: BTreeMap::new(),
        }
    }

    pub fn count(name: &str) -> Self {
        Self::new("count", name, None)
    }

    pub fn long_sum(name: &str, field_name: &str) -> Self {
        Self::new("longSum", name, Some(field_name))
    }

    pub fn double_sum(name: &str, field_name: &str) -> Self {
        Self::new("doubleSum", name, Some(field_name))
    }

    pub fn long_min(name: &str, field_name: &str) -> Self {
        Self::new("longMin", name, Some(field_name))
    }

    pub fn long_max(name: &str, field_name: &str) -> Self {
        Self::new("longMax", name, Some(field_name))
    }

    pub fn double_min(name: &str, field_name: &str) -> Self {
        Self::new("min", name, Some(field_name))
    }

    pub fn double_max(name: &str, field_name: &str) -> Self {
        Self::new("max", name, Some(field_name))
    }

    pub fn approx_histogram(name: &str, field_name: &str) -> Self {
        Self::new("approxHistogram", name, Some(field_name))
    }

    pub fn approx_histogram_fold(name: &str, field_name: &str) -> Self {
        Self::new("approxHistogramFold", name, Some(field_name))
    }

    pub fn with_param(mut self, key: &str, value: f64) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    fn require_field(&self) -> Result<String> {
        self.field_name.clone().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("Aggregator '{}' of type {} needs a fieldName", self.name, self.kind),
            )
        })
    }

    fn histogram_params(&self) -> HistogramParams {
        let defaults = HistogramParams::default();
        let get = |key: &str, default: f64| self.params.get(key).copied().unwrap_or(default);
        HistogramParams {
            resolution: get("resolution", defaults.resolution as f64).max(1.0) as usize,
            num_buckets: get("numBuckets", defaults.num_buckets as f64).max(1.0) as usize,
            lower_limit: get("lowerLimit", defaults.lower_limit),
            upper_limit: get("upperLimit", defaults.upper_limit),
        }
    }
}

pub type AggregatorBuilder = Arc<dyn Fn(&AggregatorSpec) -> Result<Box<dyn AggregatorFactory>> + Send + Sync>;

/// Type name → factory builder. Created once by the embedding process and
/// passed explicitly to whatever needs to build aggregators.
#[derive(Clone)]
pub struct AggregatorRegistry {
    builders: HashMap<String, AggregatorBuilder>,
}

impl fmt::Debug for AggregatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.builders.keys().collect();
        names.sort();
        f.debug_struct("AggregatorRegistry").field("types", &names).finish()
    }
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AggregatorRegistry {
    /// Registry without any aggregator types
    pub fn empty() -> Self {
        AggregatorRegistry {
            builders: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register("count", |spec| {
            Ok(Box::new(CountAggregatorFactory { name: spec.name.clone() }))
        });
        registry.register("longSum", |spec| {
            Ok(Box::new(LongSumAggregatorFactory { name: spec.name.clone(), field_name: spec.require_field()? }))
        });
        registry.register("doubleSum", |spec| {
            Ok(Box::new(DoubleSumAggregatorFactory { name: spec.name.clone(), field_name: spec.require_field()? }))
        });
        registry.register("longMin", |spec| long_bound(spec, Bound::Min));
        registry.register("longMax", |spec| long_bound(spec, Bound::Max));
        registry.register("min", |spec| double_bound(spec, Bound::Min));
        registry.register("max", |spec| double_bound(spec, Bound::Max));
        registry.register("approxHistogram", |spec| histogram(spec, false));
        registry.register("approxHistogramFold", |spec| histogram(spec, true));

        registry
    }

    /// Adds or replaces the builder for a type name
    pub fn register<F>(&mut self, type_name: &str, builder: F)
    where
        F: Fn(&AggregatorSpec) -> Result<Box<dyn AggregatorFactory>> + Send + Sync + 'static,
    {
        self.builders.insert(type_name.to_string(), Arc::new(builder));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    pub fn build(&self, spec: &AggregatorSpec) -> Result<Box<dyn AggregatorFactory>> {
        let builder = self.builders.get(&spec.kind).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("Unknown aggregator type '{}' for '{}'", spec.kind, spec.name),
            )
        })?;
        builder(spec)
    }

    /// Builds every spec, rejecting duplicate output names
    pub fn build_all(&self, specs: &[AggregatorSpec]) -> Result<Vec<Box<dyn AggregatorFactory>>> {
        let mut seen = std::collections::HashSet::new();
        specs.iter().map(|spec| {
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("Duplicate aggregator name '{}'", spec.name),
                ));
            }
            self.build(spec)
        }).collect()
    }
}

fn long_bound(spec: &AggregatorSpec, bound: Bound) -> Result<Box<dyn AggregatorFactory>> {
    Ok(Box::new(LongBoundAggregatorFactory {
        name: spec.name.clone(),
        field_name: spec.require_field()?,
        bound,
    }))
}

fn double_bound(spec: &AggregatorSpec, bound: Bound) -> Result<Box<dyn AggregatorFactory>> {
    Ok(Box::new(DoubleBoundAggregatorFactory {
        name: spec.name.clone(),
        field_name: spec.require_field()?,
        bound,
    }))
}

fn histogram(spec: &AggregatorSpec, fold: bool) -> Result<Box<dyn AggregatorFactory>> {
    Ok(Box::new(ApproxHistogramAggregatorFactory {
        name: spec.name.clone(),
        field_name: spec.require_field()?,
        params: spec.histogram_params(),
        fold,
    }))
}
