// =============================================================================
// Statistical Summary Aggregation
// =============================================================================
//
// One pass over the partitioned dataset produces per-feature count, mean,
// variance, min, and max. Each partition accumulates raw moments
// {count, sum, sum of squares, min, max}; partials merge pairwise with an
// associative, commutative combine, so any partitioning and any tree-reduce
// depth yields the same summary up to floating rounding.
//
// Sparse vectors contribute their implicit zeros correctly: sums and squared
// sums are untouched by zeros, while min/max are widened to include 0 for
// any feature that was absent from at least one example (tracked with a
// per-feature stored-entry count).
//
// Variance uses the population formula E[x^2] - mean^2, clamped at zero
// against small negative results from cancellation.
//
// =============================================================================

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::dataset::{DistributedCollection, FeatureVector, LabeledExample};
use crate::error::{Result, ScaleGlmError};

// =============================================================================
// Per-partition partials
// =============================================================================

/// Raw per-feature moments for one partition (or a merge of partitions).
///
/// The merge operation is associative and commutative.
#[derive(Debug, Clone)]
pub struct FeaturePartials {
    count: u64,
    sum: Array1<f64>,
    sum_sq: Array1<f64>,
    min: Array1<f64>,
    max: Array1<f64>,
    /// How many examples stored an explicit entry for each feature.
    stored: Array1<u64>,
}

impl FeaturePartials {
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            sum: Array1::zeros(dim),
            sum_sq: Array1::zeros(dim),
            min: Array1::from_elem(dim, f64::INFINITY),
            max: Array1::from_elem(dim, f64::NEG_INFINITY),
            stored: Array1::zeros(dim),
        }
    }

    pub fn dim(&self) -> usize {
        self.sum.len()
    }

    /// Fold one feature vector into the partials. Fails with
    /// `DimensionMismatch` on the first vector whose dimension disagrees.
    pub fn observe(&mut self, features: &FeatureVector) -> Result<()> {
        let d = self.dim();
        if features.dim() != d {
            return Err(ScaleGlmError::DimensionMismatch(format!(
                "expected feature dimension {}, found {}",
                d,
                features.dim()
            )));
        }
        self.count += 1;
        for (j, x) in features.iter_stored() {
            self.sum[j] += x;
            self.sum_sq[j] += x * x;
            if x < self.min[j] {
                self.min[j] = x;
            }
            if x > self.max[j] {
                self.max[j] = x;
            }
            self.stored[j] += 1;
        }
        Ok(())
    }

    /// Combine two partials. Associative and commutative.
    pub fn merge(mut self, other: FeaturePartials) -> FeaturePartials {
        debug_assert_eq!(self.dim(), other.dim());
        self.count += other.count;
        self.sum += &other.sum;
        self.sum_sq += &other.sum_sq;
        for j in 0..self.dim() {
            self.min[j] = self.min[j].min(other.min[j]);
            self.max[j] = self.max[j].max(other.max[j]);
            self.stored[j] += other.stored[j];
        }
        self
    }

    /// Finalize into a summary. Fails if no examples were observed.
    pub fn finalize(self) -> Result<StatisticalSummary> {
        if self.count == 0 {
            return Err(ScaleGlmError::EmptyInput(
                "cannot summarize zero examples".to_string(),
            ));
        }
        let n = self.count as f64;
        let d = self.dim();
        let mean = &self.sum / n;
        let mut variance = &self.sum_sq / n - &(&mean * &mean);
        let mut min = self.min;
        let mut max = self.max;
        for j in 0..d {
            // Cancellation can push the population variance slightly negative.
            if variance[j] < 0.0 {
                variance[j] = 0.0;
            }
            // Features absent from some example take the implicit value 0.
            if self.stored[j] < self.count {
                min[j] = min[j].min(0.0);
                max[j] = max[j].max(0.0);
            }
        }
        Ok(StatisticalSummary { count: self.count, mean, variance, min, max })
    }
}

// =============================================================================
// The summary
// =============================================================================

/// Per-feature statistics of one dataset snapshot.
///
/// Built once per dataset; must be rebuilt if the dataset changes. Variance
/// is the population variance (ddof = 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalSummary {
    pub count: u64,
    pub mean: Array1<f64>,
    pub variance: Array1<f64>,
    pub min: Array1<f64>,
    pub max: Array1<f64>,
}

impl StatisticalSummary {
    /// Aggregate a summary over a distributed collection.
    ///
    /// Each partition is scanned once; partials are merged through a
    /// bounded-depth reduction tree. Any example whose feature count
    /// differs from `dim` fails the whole aggregation with
    /// `DimensionMismatch`.
    pub fn aggregate<D>(data: &D, dim: usize, tree_depth: usize) -> Result<Self>
    where
        D: DistributedCollection<LabeledExample>,
    {
        if dim == 0 {
            return Err(ScaleGlmError::InvalidValue(
                "feature dimension must be at least 1".to_string(),
            ));
        }
        log::debug!(
            "aggregating statistical summary over {} examples, dim {}",
            data.num_examples(),
            dim
        );
        let partials = data.map_reduce(
            |partition| {
                let mut acc = FeaturePartials::new(dim);
                for example in partition {
                    acc.observe(&example.features)?;
                }
                Ok(acc)
            },
            FeaturePartials::merge,
            tree_depth,
        )?;
        partials.finalize()
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Population standard deviation per feature.
    pub fn stddev(&self) -> Array1<f64> {
        self.variance.mapv(f64::sqrt)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::PartitionedDataSet;

    fn dataset(rows: &[&[f64]], num_partitions: usize) -> PartitionedDataSet {
        let examples: Vec<LabeledExample> = rows
            .iter()
            .map(|r| LabeledExample::new(0.0, FeatureVector::dense(r)))
            .collect();
        PartitionedDataSet::partition(examples, num_partitions).unwrap()
    }

    #[test]
    fn test_basic_moments() {
        let data = dataset(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]], 1);
        let s = StatisticalSummary::aggregate(&data, 2, 2).unwrap();
        assert_eq!(s.count, 3);
        assert!((s.mean[0] - 3.0).abs() < 1e-12);
        assert!((s.mean[1] - 4.0).abs() < 1e-12);
        // Population variance of {1, 3, 5} is 8/3.
        assert!((s.variance[0] - 8.0 / 3.0).abs() < 1e-12);
        assert!((s.min[0] - 1.0).abs() < 1e-15);
        assert!((s.max[1] - 6.0).abs() < 1e-15);
    }

    #[test]
    fn test_partition_independence() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i as f64) * 0.37 - 3.0, ((i * i) % 17) as f64])
            .collect();
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let baseline = StatisticalSummary::aggregate(&dataset(&refs, 1), 2, 1).unwrap();
        for parts in [2, 3, 7, 50] {
            for depth in [1, 2, 3] {
                let s = StatisticalSummary::aggregate(&dataset(&refs, parts), 2, depth).unwrap();
                for j in 0..2 {
                    assert!((s.mean[j] - baseline.mean[j]).abs() < 1e-10);
                    assert!((s.variance[j] - baseline.variance[j]).abs() < 1e-10);
                    assert_eq!(s.min[j], baseline.min[j]);
                    assert_eq!(s.max[j], baseline.max[j]);
                }
            }
        }
    }

    #[test]
    fn test_sparse_zeros_count_toward_moments() {
        // Feature 1 is present in only one of three examples; its implicit
        // zeros must show up in mean, variance, and min.
        let examples = vec![
            LabeledExample::new(0.0, FeatureVector::sparse(2, vec![0], vec![3.0]).unwrap()),
            LabeledExample::new(0.0, FeatureVector::sparse(2, vec![0, 1], vec![3.0, 6.0]).unwrap()),
            LabeledExample::new(0.0, FeatureVector::sparse(2, vec![0], vec![3.0]).unwrap()),
        ];
        let data = PartitionedDataSet::partition(examples, 2).unwrap();
        let s = StatisticalSummary::aggregate(&data, 2, 2).unwrap();
        assert!((s.mean[1] - 2.0).abs() < 1e-12);
        assert!((s.variance[1] - 8.0).abs() < 1e-12);
        assert_eq!(s.min[1], 0.0);
        assert_eq!(s.max[1], 6.0);
        // Feature 0 is constant.
        assert!((s.variance[0] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch_detected() {
        let examples = vec![
            LabeledExample::new(0.0, FeatureVector::dense(&[1.0, 2.0])),
            LabeledExample::new(0.0, FeatureVector::dense(&[1.0, 2.0, 3.0])),
        ];
        let data = PartitionedDataSet::partition(examples, 1).unwrap();
        let result = StatisticalSummary::aggregate(&data, 2, 2);
        assert!(matches!(result, Err(ScaleGlmError::DimensionMismatch(_))));
    }

    #[test]
    fn test_variance_clamped_nonnegative() {
        // Large mean with tiny spread invites cancellation in E[x^2]-mean^2.
        let data = dataset(&[&[1e9], &[1e9], &[1e9]], 1);
        let s = StatisticalSummary::aggregate(&data, 1, 1).unwrap();
        assert!(s.variance[0] >= 0.0);
    }

    #[test]
    fn test_summary_serializes() {
        let data = dataset(&[&[1.0, 2.0], &[3.0, 4.0]], 1);
        let s = StatisticalSummary::aggregate(&data, 2, 1).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: StatisticalSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.count, 2);
        assert!((back.mean[1] - s.mean[1]).abs() < 1e-15);
    }
}
