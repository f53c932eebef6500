use std::fmt;
use crate::aggregation::histogram::{ApproximateHistogram, DEFAULT_NUM_BUCKETS, DEFAULT_RESOLUTION};
use crate::aggregation::registry::AggregatorSpec;
use crate::aggregation::value::Value;
use crate::core::error::{Error, ErrorKind, Result};

/// Capability set of one metric aggregator. The same factory is used at
/// ingest (raw record values) and at query time (persisted metric values).
///
/// `combine` must be associative and commutative.
pub trait AggregatorFactory: Send + Sync + fmt::Debug {
    /// Output column name
    fn name(&self) -> &str;

    /// Input column, `None` for `count`
    fn field_name(&self) -> Option<&str>;

    fn type_name(&self) -> &'static str;

    fn initialize(&self) -> Value;

    fn accumulate(&self, current: &mut Value, incoming: &Value) -> Result<()>;

    fn combine(&self, current: &mut Value, other: &Value);

    fn finalize(&self, state: &Value) -> Value;

    /// Aggregator that rolls up this aggregator's own output column
    fn combining_factory(&self) -> Box<dyn AggregatorFactory>;

    /// Serializable description, used when a segment records its schema
    fn spec(&self) -> AggregatorSpec;
}

/// Counts rows; ignores the input value
#[derive(Debug, Clone)]
pub struct CountAggregatorFactory {
    pub name: String,
}

impl AggregatorFactory for CountAggregatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_name(&self) -> Option<&str> {
        None
    }

    fn type_name(&self) -> &'static str {
        "count"
    }

    fn initialize(&self) -> Value {
        Value::Long(0)
    }

    fn accumulate(&self, current: &mut Value, _incoming: &Value) -> Result<()> {
        if let Value::Long(n) = current {
            *n += 1;
        }
        Ok(())
    }

    fn combine(&self, current: &mut Value, other: &Value) {
        combine_long_sum(current, other);
    }

    fn finalize(&self, state: &Value) -> Value {
        state.clone()
    }

    fn combining_factory(&self) -> Box<dyn AggregatorFactory> {
        Box::new(LongSumAggregatorFactory {
            name: self.name.clone(),
            field_name: self.name.clone(),
        })
    }

    fn spec(&self) -> AggregatorSpec {
        AggregatorSpec::count(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct LongSumAggregatorFactory {
    pub name: String,
    pub field_name: String,
}

impl AggregatorFactory for LongSumAggregatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn type_name(&self) -> &'static str {
        "longSum"
    }

    fn initialize(&self) -> Value {
        Value::Long(0)
    }

    fn accumulate(&self, current: &mut Value, incoming: &Value) -> Result<()> {
        if let Some(v) = incoming.long_input(&self.field_name)? {
            combine_long_sum(current, &Value::Long(v));
        }
        Ok(())
    }

    fn combine(&self, current: &mut Value, other: &Value) {
        combine_long_sum(current, other);
    }

    fn finalize(&self, state: &Value) -> Value {
        state.clone()
    }

    fn combining_factory(&self) -> Box<dyn AggregatorFactory> {
        Box::new(LongSumAggregatorFactory {
            name: self.name.clone(),
            field_name: self.name.clone(),
        })
    }

    fn spec(&self) -> AggregatorSpec {
        AggregatorSpec::long_sum(&self.name, &self.field_name)
    }
}

#[derive(Debug, Clone)]
pub struct DoubleSumAggregatorFactory {
    pub name: String,
    pub field_name: String,
}

impl AggregatorFactory for DoubleSumAggregatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn type_name(&self) -> &'static str {
        "doubleSum"
    }

    fn initialize(&self) -> Value {
        Value::Double(0.0)
    }

    fn accumulate(&self, current: &mut Value, incoming: &Value) -> Result<()> {
        if let Some(v) = incoming.numeric_input(&self.field_name)? {
            combine_double_sum(current, &Value::Double(v));
        }
        Ok(())
    }

    fn combine(&self, current: &mut Value, other: &Value) {
        combine_double_sum(current, other);
    }

    fn finalize(&self, state: &Value) -> Value {
        state.clone()
    }

    fn combining_factory(&self) -> Box<dyn AggregatorFactory> {
        Box::new(DoubleSumAggregatorFactory {
            name: self.name.clone(),
            field_name: self.name.clone(),
        })
    }

    fn spec(&self) -> AggregatorSpec {
        AggregatorSpec::double_sum(&self.name, &self.field_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

impl Bound {
    fn pick_long(self, a: i64, b: i64) -> i64 {
        match self {
            Bound::Min => a.min(b),
            Bound::Max => a.max(b),
        }
    }

    fn pick_double(self, a: f64, b: f64) -> f64 {
        match self {
            Bound::Min => a.min(b),
            Bound::Max => a.max(b),
        }
    }
}

/// `longMin` / `longMax`
#[derive(Debug, Clone)]
pub struct LongBoundAggregatorFactory {
    pub name: String,
    pub field_name: String,
    pub bound: Bound,
}

impl LongBoundAggregatorFactory {
    fn merge(&self, current: &mut Value, other: i64) {
        *current = match current {
            Value::Long(v) => Value::Long(self.bound.pick_long(*v, other)),
            _ => Value::Long(other),
        };
    }
}

impl AggregatorFactory for LongBoundAggregatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn type_name(&self) -> &'static str {
        match self.bound {
            Bound::Min => "longMin",
            Bound::Max => "longMax",
        }
    }

    fn initialize(&self) -> Value {
        match self.bound {
            Bound::Min => Value::Long(i64::MAX),
            Bound::Max => Value::Long(i64::MIN),
        }
    }

    fn accumulate(&self, current: &mut Value, incoming: &Value) -> Result<()> {
        if let Some(v) = incoming.long_input(&self.field_name)? {
            self.merge(current, v);
        }
        Ok(())
    }

    fn combine(&self, current: &mut Value, other: &Value) {
        if let Some(v) = other.as_i64() {
            self.merge(current, v);
        }
    }

    fn finalize(&self, state: &Value) -> Value {
        state.clone()
    }

    fn combining_factory(&self) -> Box<dyn AggregatorFactory> {
        Box::new(LongBoundAggregatorFactory {
            name: self.name.clone(),
            field_name: self.name.clone(),
            bound: self.bound,
        })
    }

    fn spec(&self) -> AggregatorSpec {
        match self.bound {
            Bound::Min => AggregatorSpec::long_min(&self.name, &self.field_name),
            Bound::Max => AggregatorSpec::long_max(&self.name, &self.field_name),
        }
    }
}

/// `min` / `max` over doubles
#[derive(Debug, Clone)]
pub struct DoubleBoundAggregatorFactory {
    pub name: String,
    pub field_name: String,
    pub bound: Bound,
}

impl DoubleBoundAggregatorFactory {
    fn merge(&self, current: &mut Value, other: f64) {
        *current = match current.as_f64() {
            Some(v) => Value::Double(self.bound.pick_double(v, other)),
            None => Value::Double(other),
        };
    }
}

impl AggregatorFactory for DoubleBoundAggregatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn type_name(&self) -> &'static str {
        match self.bound {
            Bound::Min => "min",
            Bound::Max => "max",
        }
    }

    fn initialize(&self) -> Value {
        match self.bound {
            Bound::Min => Value::Double(f64::INFINITY),
            Bound::Max => Value::Double(f64::NEG_INFINITY),
        }
    }

    fn accumulate(&self, current: &mut Value, incoming: &Value) -> Result<()> {
        if let Some(v) = incoming.numeric_input(&self.field_name)? {
            self.merge(current, v);
        }
        Ok(())
    }

    fn combine(&self, current: &mut Value, other: &Value) {
        if let Some(v) = other.as_f64() {
            self.merge(current, v);
        }
    }

    fn finalize(&self, state: &Value) -> Value {
        state.clone()
    }

    fn combining_factory(&self) -> Box<dyn AggregatorFactory> {
        Box::new(DoubleBoundAggregatorFactory {
            name: self.name.clone(),
            field_name: self.name.clone(),
            bound: self.bound,
        })
    }

    fn spec(&self) -> AggregatorSpec {
        match self.bound {
            Bound::Min => AggregatorSpec::double_min(&self.name, &self.field_name),
            Bound::Max => AggregatorSpec::double_max(&self.name, &self.field_name),
        }
    }
}

/// Histogram parameters shared by `approxHistogram` and `approxHistogramFold`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramParams {
    pub resolution: usize,
    pub num_buckets: usize,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

impl Default for HistogramParams {
    fn default() -> Self {
        HistogramParams {
            resolution: DEFAULT_RESOLUTION,
            num_buckets: DEFAULT_NUM_BUCKETS,
            lower_limit: f64::NEG_INFINITY,
            upper_limit: f64::INFINITY,
        }
    }
}

/// `approxHistogram` offers raw numbers; with `fold` set it instead merges
/// histograms that were already built (`approxHistogramFold`).
#[derive(Debug, Clone)]
pub struct ApproxHistogramAggregatorFactory {
    pub name: String,
    pub field_name: String,
    pub params: HistogramParams,
    pub fold: bool,
}

impl ApproxHistogramAggregatorFactory {
    fn empty(&self) -> ApproximateHistogram {
        ApproximateHistogram::new(self.params.resolution, self.params.lower_limit, self.params.upper_limit)
    }

    fn update(&self, current: &mut Value, f: impl FnOnce(&mut ApproximateHistogram)) {
        match current {
            Value::Histogram(h) => f(h),
            _ => {
                let mut h = self.empty();
                f(&mut h);
                *current = Value::Histogram(Box::new(h));
            }
        }
    }
}

impl AggregatorFactory for ApproxHistogramAggregatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn type_name(&self) -> &'static str {
        if self.fold { "approxHistogramFold" } else { "approxHistogram" }
    }

    fn initialize(&self) -> Value {
        Value::Histogram(Box::new(self.empty()))
    }

    fn accumulate(&self, current: &mut Value, incoming: &Value) -> Result<()> {
        match incoming {
            Value::Histogram(other) => {
                self.update(current, |h| h.fold(other));
                Ok(())
            }
            _ if self.fold && !incoming.is_null() => Err(Error::new(
                ErrorKind::SchemaMismatch,
                format!("'{}' folds histograms, got {}", self.name, incoming.type_name()),
            )),
            _ => {
                if let Some(v) = incoming.numeric_input(&self.field_name)? {
                    self.update(current, |h| h.offer(v));
                }
                Ok(())
            }
        }
    }

    fn combine(&self, current: &mut Value, other: &Value) {
        if let Value::Histogram(other) = other {
            self.update(current, |h| h.fold(other));
        }
    }

    fn finalize(&self, state: &Value) -> Value {
        state.clone()
    }

    fn combining_factory(&self) -> Box<dyn AggregatorFactory> {
        Box::new(ApproxHistogramAggregatorFactory {
            name: self.name.clone(),
            field_name: self.name.clone(),
            params: self.params,
            fold: true,
        })
    }

    fn spec(&self) -> AggregatorSpec {
        let spec = if self.fold {
            AggregatorSpec::approx_histogram_fold(&self.name, &self.field_name)
        } else {
            AggregatorSpec::approx_histogram(&self.name, &self.field_name)
        };
        let mut spec = spec
            .with_param("resolution", self.params.resolution as f64)
            .with_param("numBuckets", self.params.num_buckets as f64);
        // Unbounded limits are the default and stay implicit
        if self.params.lower_limit.is_finite() {
            spec = spec.with_param("lowerLimit", self.params.lower_limit);
        }
        if self.params.upper_limit.is_finite() {
            spec = spec.with_param("upperLimit", self.params.upper_limit);
        }
        spec
    }
}

fn combine_long_sum(current: &mut Value, other: &Value) {
    if let Some(v) = other.as_i64() {
        *current = match current {
            Value::Long(c) => Value::Long(c.wrapping_add(v)),
            _ => Value::Long(v),
        };
    }
}

fn combine_double_sum(current: &mut Value, other: &Value) {
    if let Some(v) = other.as_f64() {
        *current = match current.as_f64() {
            Some(c) => Value::Double(c + v),
            None => Value::Double(v),
        };
    }
}

/// Accumulates every input into a fresh state and finalizes it
pub fn aggregate_all<'a>(factory: &dyn AggregatorFactory, inputs: impl IntoIterator<Item = &'a Value>) -> Result<Value> {
    let mut state = factory.initialize();
    for input in inputs {
        factory.accumulate(&mut state, input)?;
    }
    Ok(factory.finalize(&state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_sum() -> LongSumAggregatorFactory {
        LongSumAggregatorFactory { name: "agg_count".into(), field_name: "count".into() }
    }

    #[test]
    fn count_ignores_input_and_rolls_up_as_sum() {
        let count = CountAggregatorFactory { name: "rows".into() };
        let total = aggregate_all(&count, &[Value::Null, Value::from("x"), Value::Long(9)]).unwrap();
        assert_eq!(total, Value::Long(3));
        let rollup = count.combining_factory();
        assert_eq!(rollup.type_name(), "longSum");
        assert_eq!(rollup.field_name(), Some("rows"));
    }

    #[test]
    fn long_sum_parses_text_and_skips_absent() {
        let total = aggregate_all(&long_sum(), &[Value::from("5"), Value::Null, Value::Long(7)]).unwrap();
        assert_eq!(total, Value::Long(12));
        assert!(aggregate_all(&long_sum(), &[Value::from("five")]).is_err());
    }

    #[test]
    fn bounds_start_at_identity() {
        let min = DoubleBoundAggregatorFactory { name: "min".into(), field_name: "v".into(), bound: Bound::Min };
        let max = LongBoundAggregatorFactory { name: "max".into(), field_name: "v".into(), bound: Bound::Max };
        let inputs = [Value::Double(3.0), Value::Long(-2), Value::from("10")];
        assert_eq!(aggregate_all(&min, &inputs).unwrap(), Value::Double(-2.0));
        assert_eq!(aggregate_all(&max, &inputs).unwrap(), Value::Long(10));
        assert_eq!(aggregate_all(&max, Vec::<Value>::new().iter()).unwrap(), Value::Long(i64::MIN));
    }

    #[test]
    fn combine_is_order_independent() {
        let factory = long_sum();
        let mut left = Value::Long(4);
        factory.combine(&mut left, &Value::Long(9));
        let mut right = Value::Long(9);
        factory.combine(&mut right, &Value::Long(4));
        assert_eq!(left, right);
    }

    #[test]
    fn histogram_fold_rejects_plain_numbers() {
        let ingest = ApproxHistogramAggregatorFactory {
            name: "h".into(),
            field_name: "value".into(),
            params: HistogramParams::default(),
            fold: false,
        };
        let built = aggregate_all(&ingest, &[Value::Double(1.0), Value::Double(2.0)]).unwrap();
        assert_eq!(built.as_histogram().map(|h| h.count()), Some(2));

        let fold = ingest.combining_factory();
        assert_eq!(fold.type_name(), "approxHistogramFold");
        let folded = aggregate_all(fold.as_ref(), &[built.clone(), built]).unwrap();
        assert_eq!(folded.as_histogram().map(|h| h.count()), Some(4));
        assert!(aggregate_all(fold.as_ref(), &[Value::Double(1.0)]).is_err());
    }
}
