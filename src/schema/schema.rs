use serde::{Serialize, Deserialize};
use crate::aggregation::registry::AggregatorSpec;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Timestamp;
use crate::query::granularity::Granularity;

/// Which dimensions an index keeps. An empty `dimensions` list means
/// schemaless: every dimension a record names is kept, minus `exclusions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionsSpec {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub dimension_exclusions: Vec<String>,
}

impl DimensionsSpec {
    pub fn explicit(dimensions: &[&str]) -> Self {
        DimensionsSpec {
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            dimension_exclusions: Vec::new(),
        }
    }

    pub fn schemaless() -> Self {
        DimensionsSpec::default()
    }

    pub fn is_explicit(&self) -> bool {
        !self.dimensions.is_empty()
    }

    pub fn is_excluded(&self, dimension: &str) -> bool {
        self.dimension_exclusions.iter().any(|d| d == dimension)
    }
}

/// Declared shape of an incremental index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    pub min_timestamp: Timestamp,
    pub granularity: Granularity,                // Ingest-time truncation
    pub dimensions_spec: DimensionsSpec,
    pub metrics: Vec<AggregatorSpec>,
}

impl IndexSchema {
    pub fn new(dimensions_spec: DimensionsSpec, metrics: Vec<AggregatorSpec>) -> Self {
        IndexSchema {
            min_timestamp: 0,
            granularity: Granularity::None,
            dimensions_spec,
            metrics,
        }
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_min_timestamp(mut self, min_timestamp: Timestamp) -> Self {
        self.min_timestamp = min_timestamp;
        self
    }

    /// Rejects metric names that collide with each other or with a dimension
    pub fn validate(&self) -> Result<()> {
        for (i, metric) in self.metrics.iter().enumerate() {
            if self.metrics[..i].iter().any(|m| m.name == metric.name) {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("Metric '{}' declared twice", metric.name),
                ));
            }
            if self.dimensions_spec.dimensions.iter().any(|d| *d == metric.name) {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("'{}' is declared as both a dimension and a metric", metric.name),
                ));
            }
        }
        Ok(())
    }
}
