use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use crate::aggregation::histogram::ApproximateHistogram;
use crate::aggregation::value::{Quantiles, Value};
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "*")]
    Multiply,
    /// Division where a zero divisor yields 0
    #[serde(rename = "/")]
    Divide,
    /// Plain floating point division
    #[serde(rename = "quotient")]
    Quotient,
}

impl ArithmeticOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            ArithmeticOp::Plus => lhs + rhs,
            ArithmeticOp::Minus => lhs - rhs,
            ArithmeticOp::Multiply => lhs * rhs,
            ArithmeticOp::Divide => if rhs == 0.0 { 0.0 } else { lhs / rhs },
            ArithmeticOp::Quotient => lhs / rhs,
        }
    }
}

/// Pure expression over finalized aggregator outputs of one result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PostAggregator {
    FieldAccess {
        name: String,
        field_name: String,
    },
    Constant {
        name: String,
        value: f64,
    },
    Arithmetic {
        name: String,
        #[serde(rename = "fn")]
        op: ArithmeticOp,
        fields: Vec<PostAggregator>,
    },
    Quantile {
        name: String,
        field_name: String,
        probability: f64,
    },
    Quantiles {
        name: String,
        field_name: String,
        probabilities: Vec<f64>,
    },
    Min {
        name: String,
        field_name: String,
    },
    Max {
        name: String,
        field_name: String,
    },
}

impl PostAggregator {
    pub fn field_access(name: &str, field_name: &str) -> Self {
        PostAggregator::FieldAccess { name: name.to_string(), field_name: field_name.to_string() }
    }

    pub fn constant(name: &str, value: f64) -> Self {
        PostAggregator::Constant { name: name.to_string(), value }
    }

    pub fn arithmetic(name: &str, op: ArithmeticOp, fields: Vec<PostAggregator>) -> Self {
        PostAggregator::Arithmetic { name: name.to_string(), op, fields }
    }

    pub fn quantile(name: &str, field_name: &str, probability: f64) -> Self {
        PostAggregator::Quantile { name: name.to_string(), field_name: field_name.to_string(), probability }
    }

    pub fn quantiles(name: &str, field_name: &str, probabilities: Vec<f64>) -> Self {
        PostAggregator::Quantiles { name: name.to_string(), field_name: field_name.to_string(), probabilities }
    }

    pub fn name(&self) -> &str {
        match self {
            PostAggregator::FieldAccess { name, .. }
            | PostAggregator::Constant { name, .. }
            | PostAggregator::Arithmetic { name, .. }
            | PostAggregator::Quantile { name, .. }
            | PostAggregator::Quantiles { name, .. }
            | PostAggregator::Min { name, .. }
            | PostAggregator::Max { name, .. } => name,
        }
    }

    pub fn compute(&self, row: &BTreeMap<String, Value>) -> Result<Value> {
        match self {
            PostAggregator::FieldAccess { field_name, .. } => {
                Ok(row.get(field_name).cloned().unwrap_or(Value::Null))
            }
            PostAggregator::Constant { value, .. } => Ok(Value::Double(*value)),
            PostAggregator::Arithmetic { name, op, fields } => {
                let mut operands = fields.iter();
                let first = operands.next().ok_or_else(|| {
                    Error::new(ErrorKind::InvalidArgument, format!("Arithmetic '{}' has no fields", name))
                })?;
                let mut acc = operand(&first.compute(row)?);
                for field in operands {
                    acc = op.apply(acc, operand(&field.compute(row)?));
                }
                Ok(Value::Double(acc))
            }
            PostAggregator::Quantile { name, field_name, probability } => {
                let h = histogram(row, name, field_name)?;
                Ok(Value::Double(h.quantile(*probability)))
            }
            PostAggregator::Quantiles { name, field_name, probabilities } => {
                let h = histogram(row, name, field_name)?;
                Ok(Value::Quantiles(Quantiles {
                    probabilities: probabilities.clone(),
                    quantiles: h.quantiles(probabilities),
                    min: h.min,
                    max: h.max,
                }))
            }
            PostAggregator::Min { name, field_name } => Ok(Value::Double(histogram(row, name, field_name)?.min)),
            PostAggregator::Max { name, field_name } => Ok(Value::Double(histogram(row, name, field_name)?.max)),
        }
    }
}

/// Evaluates post-aggregators in order, each seeing the outputs of earlier ones
pub fn apply_post_aggregators(post_aggregators: &[PostAggregator], row: &mut BTreeMap<String, Value>) -> Result<()> {
    for post in post_aggregators {
        let value = post.compute(row)?;
        row.insert(post.name().to_string(), value);
    }
    Ok(())
}

fn operand(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

fn histogram<'a>(row: &'a BTreeMap<String, Value>, name: &str, field_name: &str) -> Result<&'a ApproximateHistogram> {
    row.get(field_name).and_then(Value::as_histogram).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidArgument,
            format!("Post-aggregator '{}' needs a histogram in '{}'", name, field_name),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> BTreeMap<String, Value> {
        let mut h = ApproximateHistogram::default();
        for v in [1.0, 2.0, 3.0, 4.0] {
            h.offer(v);
        }
        let mut row = BTreeMap::new();
        row.insert("agg_sum".to_string(), Value::Double(247.0));
        row.insert("agg_count".to_string(), Value::Long(12));
        row.insert("agg_histogram".to_string(), Value::Histogram(Box::new(h)));
        row
    }

    #[test]
    fn average_from_sum_and_count() {
        let avg = PostAggregator::arithmetic("avg", ArithmeticOp::Divide, vec![
            PostAggregator::field_access("s", "agg_sum"),
            PostAggregator::field_access("c", "agg_count"),
        ]);
        let value = avg.compute(&row()).unwrap().as_f64().unwrap();
        assert!((value - 247.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn divide_by_zero_is_zero_but_quotient_is_not() {
        let fields = vec![PostAggregator::constant("a", 1.0), PostAggregator::constant("b", 0.0)];
        let divide = PostAggregator::arithmetic("d", ArithmeticOp::Divide, fields.clone());
        let quotient = PostAggregator::arithmetic("q", ArithmeticOp::Quotient, fields);
        assert_eq!(divide.compute(&row()).unwrap(), Value::Double(0.0));
        assert_eq!(quotient.compute(&row()).unwrap(), Value::Double(f64::INFINITY));
    }

    #[test]
    fn later_post_aggregators_see_earlier_ones() {
        let posts = vec![
            PostAggregator::arithmetic("double_count", ArithmeticOp::Multiply, vec![
                PostAggregator::field_access("c", "agg_count"),
                PostAggregator::constant("two", 2.0),
            ]),
            PostAggregator::arithmetic("plus_one", ArithmeticOp::Plus, vec![
                PostAggregator::field_access("d", "double_count"),
                PostAggregator::constant("one", 1.0),
            ]),
        ];
        let mut row = row();
        apply_post_aggregators(&posts, &mut row).unwrap();
        assert_eq!(row.get("plus_one"), Some(&Value::Double(25.0)));
    }

    #[test]
    fn quantiles_read_histograms() {
        let q = PostAggregator::quantiles("q", "agg_histogram", vec![0.0, 1.0]);
        match q.compute(&row()).unwrap() {
            Value::Quantiles(out) => {
                assert_eq!(out.quantiles, vec![1.0, 4.0]);
                assert_eq!((out.min, out.max), (1.0, 4.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        let bad = PostAggregator::quantile("q", "agg_sum", 0.5);
        assert_eq!(bad.compute(&row()).unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn json_uses_type_tags() {
        let post: PostAggregator = serde_json::from_str(
            r#"{"type":"arithmetic","name":"avg","fn":"/","fields":[
                {"type":"fieldAccess","name":"s","fieldName":"agg_sum"},
                {"type":"constant","name":"c","value":2}]}"#,
        ).unwrap();
        assert_eq!(post.compute(&row()).unwrap(), Value::Double(123.5));
    }
}
