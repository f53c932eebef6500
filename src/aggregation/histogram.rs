use serde::{Serialize, Deserialize};

pub const DEFAULT_RESOLUTION: usize = 50;
pub const DEFAULT_NUM_BUCKETS: usize = 7;

/// Streaming histogram that keeps at most `resolution` weighted centroids.
/// Values outside `[lower_limit, upper_limit]` are only counted as outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximateHistogram {
    pub resolution: usize,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub positions: Vec<f64>,    // Sorted centroid positions
    pub bins: Vec<u64>,         // Weight of each centroid
    pub min: f64,
    pub max: f64,
    pub lower_outliers: u64,
    pub upper_outliers: u64,
}

/// Equal-width rendering of a histogram
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramVisual {
    pub breaks: Vec<f64>,
    pub counts: Vec<f64>,
}

impl Default for ApproximateHistogram {
    fn default() -> Self {
        ApproximateHistogram::new(DEFAULT_RESOLUTION, f64::NEG_INFINITY, f64::INFINITY)
    }
}

impl ApproximateHistogram {
    pub fn new(resolution: usize, lower_limit: f64, upper_limit: f64) -> Self {
        ApproximateHistogram {
            resolution: resolution.max(1),
            lower_limit,
            upper_limit,
            positions: Vec::new(),
            bins: Vec::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            lower_outliers: 0,
            upper_outliers: 0,
        }
    }

    /// Number of in-range values offered so far
    pub fn count(&self) -> u64 {
        self.bins.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn offer(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        if value < self.lower_limit {
            self.lower_outliers += 1;
            return;
        }
        if value > self.upper_limit {
            self.upper_outliers += 1;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.insert(value, 1);
        self.shrink();
    }

    /// Merge another histogram into this one
    pub fn fold(&mut self, other: &ApproximateHistogram) {
        for (&position, &weight) in other.positions.iter().zip(&other.bins) {
            self.insert(position, weight);
        }
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
        self.lower_outliers += other.lower_outliers;
        self.upper_outliers += other.upper_outliers;
        self.shrink();
    }

    fn insert(&mut self, position: f64, weight: u64) {
        match self.positions.binary_search_by(|p| p.total_cmp(&position)) {
            Ok(i) => self.bins[i] += weight,
            Err(i) => {
                self.positions.insert(i, position);
                self.bins.insert(i, weight);
            }
        }
    }

    /// Merge closest neighbours until the centroid budget holds
    fn shrink(&mut self) {
        while self.positions.len() > self.resolution {
            let mut best = 0;
            let mut best_gap = f64::INFINITY;
            for i in 0..self.positions.len() - 1 {
                let gap = self.positions[i + 1] - self.positions[i];
                if gap < best_gap {
                    best_gap = gap;
                    best = i;
                }
            }

            let (w1, w2) = (self.bins[best] as f64, self.bins[best + 1] as f64);
            let merged = (self.positions[best] * w1 + self.positions[best + 1] * w2) / (w1 + w2);
            self.positions[best] = merged;
            self.bins[best] += self.bins[best + 1];
            self.positions.remove(best + 1);
            self.bins.remove(best + 1);
        }
    }

    /// Approximate value below which a `probability` share of the data falls.
    /// Centroid weights are spread half to each side and interpolated linearly
    /// between min, the centroids and max.
    pub fn quantile(&self, probability: f64) -> f64 {
        let total = self.count();
        if total == 0 {
            return f64::NAN;
        }
        let p = probability.clamp(0.0, 1.0);
        let target = p * total as f64;

        let mut prev_pos = self.min;
        let mut prev_cum = 0.0;
        let mut cumulative = 0.0;
        for (&position, &weight) in self.positions.iter().zip(&self.bins) {
            let center = cumulative + weight as f64 / 2.0;
            if target <= center {
                return interpolate(prev_pos, prev_cum, position, center, target);
            }
            cumulative += weight as f64;
            prev_pos = position;
            prev_cum = center;
        }
        interpolate(prev_pos, prev_cum, self.max, total as f64, target)
    }

    pub fn quantiles(&self, probabilities: &[f64]) -> Vec<f64> {
        probabilities.iter().map(|&p| self.quantile(p)).collect()
    }

    /// Equal-width buckets between min and max; each centroid's weight lands
    /// in the bucket containing its position.
    pub fn to_visual(&self, num_buckets: usize) -> HistogramVisual {
        let num_buckets = num_buckets.max(1);
        if self.is_empty() {
            return HistogramVisual { breaks: Vec::new(), counts: Vec::new() };
        }

        let width = (self.max - self.min) / num_buckets as f64;
        let breaks: Vec<f64> = (0..=num_buckets).map(|i| self.min + width * i as f64).collect();
        let mut counts = vec![0.0; num_buckets];
        for (&position, &weight) in self.positions.iter().zip(&self.bins) {
            let index = if width > 0.0 {
                (((position - self.min) / width) as usize).min(num_buckets - 1)
            } else {
                0
            };
            counts[index] += weight as f64;
        }
        HistogramVisual { breaks, counts }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let visual = self.to_visual(DEFAULT_NUM_BUCKETS);
        serde_json::json!({
            "breaks": visual.breaks,
            "counts": visual.counts,
            "count": self.count(),
            "min": finite_or_null(self.min),
            "max": finite_or_null(self.max),
        })
    }
}

fn interpolate(x0: f64, y0: f64, x1: f64, y1: f64, y: f64) -> f64 {
    if y1 <= y0 {
        return x1;
    }
    x0 + (x1 - x0) * (y - y0) / (y1 - y0)
}

fn finite_or_null(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: impl IntoIterator<Item = f64>) -> ApproximateHistogram {
        let mut h = ApproximateHistogram::default();
        for v in values {
            h.offer(v);
        }
        h
    }

    #[test]
    fn centroid_budget_is_respected() {
        let h = filled((0..1000).map(|i| i as f64));
        assert_eq!(h.positions.len(), DEFAULT_RESOLUTION);
        assert_eq!(h.count(), 1000);
        assert_eq!(h.min, 0.0);
        assert_eq!(h.max, 999.0);
    }

    #[test]
    fn median_of_uniform_data_is_close() {
        let h = filled((0..=1000).map(|i| i as f64));
        let median = h.quantile(0.5);
        assert!((median - 500.0).abs() < 50.0, "median {}", median);
        assert_eq!(h.quantile(0.0), 0.0);
        assert_eq!(h.quantile(1.0), 1000.0);
    }

    #[test]
    fn fold_matches_offering_everything() {
        let mut left = filled([1.0, 2.0, 3.0]);
        let right = filled([10.0, 20.0]);
        left.fold(&right);
        assert_eq!(left.count(), 5);
        assert_eq!(left.max, 20.0);
        assert_eq!(left, filled([1.0, 2.0, 3.0, 10.0, 20.0]));
    }

    #[test]
    fn limits_count_outliers() {
        let mut h = ApproximateHistogram::new(10, 0.0, 100.0);
        h.offer(-1.0);
        h.offer(50.0);
        h.offer(101.0);
        assert_eq!(h.count(), 1);
        assert_eq!((h.lower_outliers, h.upper_outliers), (1, 1));
    }

    #[test]
    fn visual_buckets_hold_every_value() {
        let h = filled([0.0, 1.0, 2.0, 3.0, 10.0]);
        let visual = h.to_visual(5);
        assert_eq!(visual.breaks.len(), 6);
        assert_eq!(visual.counts.iter().sum::<f64>(), 5.0);
        assert_eq!(visual.counts[4], 1.0);
    }
}
