// =============================================================================
// Dataset Types and the Distributed-Collection Contract
// =============================================================================
//
// The training data is a partitioned, read-only collection of labeled
// examples. The execution substrate that shards and schedules it is an
// external concern; all this crate needs from it is one capability:
//
//     map each partition to a partial result, then combine the partials
//     pairwise along a bounded-depth tree
//
// That capability is the `DistributedCollection` trait. `PartitionedDataSet`
// is the in-process reference implementation: partitions live behind `Arc`
// slices and the per-partition map runs on the rayon thread pool.
//
// The combine operator must be associative and commutative, so the result
// is independent of partition count and merge order up to floating-point
// rounding. A bounded tree depth keeps sequential accumulation chains short
// instead of folding everything through a single linear pass.
//
// =============================================================================

use std::sync::Arc;

use ndarray::Array1;
use rayon::prelude::*;

use crate::error::{Result, ScaleGlmError};

// =============================================================================
// Feature vectors and examples
// =============================================================================

/// A fixed-dimension feature vector, dense or sparse with explicit indices.
///
/// Sparse vectors treat unstored coordinates as exact zeros. The dimension
/// is fixed at construction and must match across every vector in a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureVector {
    Dense(Array1<f64>),
    Sparse {
        dim: usize,
        indices: Vec<usize>,
        values: Vec<f64>,
    },
}

impl FeatureVector {
    /// Build a dense vector from a slice.
    pub fn dense(values: &[f64]) -> Self {
        FeatureVector::Dense(Array1::from_vec(values.to_vec()))
    }

    /// Build a sparse vector. Indices must be strictly increasing and in
    /// range; `indices` and `values` must have equal length.
    pub fn sparse(dim: usize, indices: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(ScaleGlmError::InvalidValue(format!(
                "sparse vector has {} indices but {} values",
                indices.len(),
                values.len()
            )));
        }
        for pair in indices.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ScaleGlmError::InvalidValue(
                    "sparse indices must be strictly increasing".to_string(),
                ));
            }
        }
        if let Some(&last) = indices.last() {
            if last >= dim {
                return Err(ScaleGlmError::InvalidValue(format!(
                    "sparse index {} out of range for dimension {}",
                    last, dim
                )));
            }
        }
        Ok(FeatureVector::Sparse { dim, indices, values })
    }

    /// The dimension of the vector.
    pub fn dim(&self) -> usize {
        match self {
            FeatureVector::Dense(v) => v.len(),
            FeatureVector::Sparse { dim, .. } => *dim,
        }
    }

    /// Iterate over stored `(index, value)` entries. For dense vectors this
    /// is every coordinate; for sparse vectors only the explicit ones.
    pub fn iter_stored(&self) -> Box<dyn Iterator<Item = (usize, f64)> + '_> {
        match self {
            FeatureVector::Dense(v) => Box::new(v.iter().copied().enumerate()),
            FeatureVector::Sparse { indices, values, .. } => {
                Box::new(indices.iter().copied().zip(values.iter().copied()))
            }
        }
    }

    /// Number of stored entries.
    pub fn num_stored(&self) -> usize {
        match self {
            FeatureVector::Dense(v) => v.len(),
            FeatureVector::Sparse { values, .. } => values.len(),
        }
    }

    /// Plain dot product with a dense weight vector of the same dimension.
    pub fn dot(&self, weights: &Array1<f64>) -> f64 {
        debug_assert_eq!(self.dim(), weights.len());
        match self {
            FeatureVector::Dense(v) => v.dot(weights),
            FeatureVector::Sparse { indices, values, .. } => indices
                .iter()
                .zip(values.iter())
                .map(|(&j, &x)| x * weights[j])
                .sum(),
        }
    }

    /// Materialize as a dense `Array1`.
    pub fn to_dense(&self) -> Array1<f64> {
        match self {
            FeatureVector::Dense(v) => v.clone(),
            FeatureVector::Sparse { dim, indices, values } => {
                let mut out = Array1::zeros(*dim);
                for (&j, &x) in indices.iter().zip(values.iter()) {
                    out[j] = x;
                }
                out
            }
        }
    }
}

/// A single training example: label, features, and optional per-example
/// weight and offset.
///
/// The weight scales the example's loss contribution; the offset is an
/// additive term outside the linear predictor (e.g. log-exposure for
/// Poisson rate models). Immutable once constructed.
#[derive(Debug, Clone)]
pub struct LabeledExample {
    pub label: f64,
    pub features: FeatureVector,
    pub weight: f64,
    pub offset: f64,
}

impl LabeledExample {
    pub fn new(label: f64, features: FeatureVector) -> Self {
        Self { label, features, weight: 1.0, offset: 0.0 }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }
}

// =============================================================================
// The distributed-collection contract
// =============================================================================

/// The single capability this crate requires from the execution substrate:
/// map each partition to a partial, then tree-reduce the partials.
///
/// Requirements on the closures:
/// - `map` sees one whole partition and may fail (its error propagates;
///   retries belong to the substrate, not this layer).
/// - `combine` must be associative and commutative. Results are then
///   independent of partitioning and merge order, up to floating rounding.
/// - `depth` bounds the number of reduction levels (>= 1).
pub trait DistributedCollection<T>: Sync {
    fn map_reduce<P, M, C>(&self, map: M, combine: C, depth: usize) -> Result<P>
    where
        P: Send,
        M: Fn(&[T]) -> Result<P> + Sync,
        C: Fn(P, P) -> P + Sync;

    /// Total number of examples across all partitions.
    fn num_examples(&self) -> usize;
}

/// In-process implementation of [`DistributedCollection`]: partitions are
/// `Arc` slices, the per-partition map runs on rayon, and partials are
/// merged by [`tree_reduce`].
#[derive(Debug, Clone)]
pub struct PartitionedDataSet {
    partitions: Vec<Arc<[LabeledExample]>>,
}

impl PartitionedDataSet {
    /// Split `examples` round-robin-by-chunk into `num_partitions` pieces.
    pub fn partition(examples: Vec<LabeledExample>, num_partitions: usize) -> Result<Self> {
        if examples.is_empty() {
            return Err(ScaleGlmError::EmptyInput("no examples to partition".to_string()));
        }
        if num_partitions == 0 {
            return Err(ScaleGlmError::InvalidValue(
                "num_partitions must be at least 1".to_string(),
            ));
        }
        let n = examples.len();
        let chunk = n.div_ceil(num_partitions);
        let mut partitions: Vec<Arc<[LabeledExample]>> = Vec::new();
        let mut iter = examples.into_iter();
        loop {
            let piece: Vec<LabeledExample> = iter.by_ref().take(chunk).collect();
            if piece.is_empty() {
                break;
            }
            partitions.push(piece.into());
        }
        Ok(Self { partitions })
    }

    /// Build directly from pre-made partitions.
    pub fn from_partitions(partitions: Vec<Arc<[LabeledExample]>>) -> Result<Self> {
        if partitions.iter().all(|p| p.is_empty()) {
            return Err(ScaleGlmError::EmptyInput("all partitions are empty".to_string()));
        }
        Ok(Self { partitions })
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }
}

impl DistributedCollection<LabeledExample> for PartitionedDataSet {
    fn map_reduce<P, M, C>(&self, map: M, combine: C, depth: usize) -> Result<P>
    where
        P: Send,
        M: Fn(&[LabeledExample]) -> Result<P> + Sync,
        C: Fn(P, P) -> P + Sync,
    {
        let partials: Vec<P> = self
            .partitions
            .par_iter()
            .filter(|p| !p.is_empty())
            .map(|p| map(p))
            .collect::<Result<Vec<P>>>()?;
        tree_reduce(partials, &combine, depth)
    }

    fn num_examples(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }
}

// =============================================================================
// Bounded-depth tree reduction
// =============================================================================

/// Combine partials pairwise along a tree of at most `depth` levels.
///
/// The branching factor is chosen as ceil(n^(1/depth)) so that `depth`
/// levels suffice for `n` partials; each level groups consecutive partials
/// into chunks and folds every chunk in parallel. A linear fold is the
/// degenerate `depth == 1` case.
pub fn tree_reduce<P, C>(partials: Vec<P>, combine: &C, depth: usize) -> Result<P>
where
    P: Send,
    C: Fn(P, P) -> P + Sync,
{
    if partials.is_empty() {
        return Err(ScaleGlmError::EmptyInput("nothing to reduce".to_string()));
    }
    let depth = depth.max(1);
    let branch = branching_factor(partials.len(), depth);

    let mut level = partials;
    while level.len() > 1 {
        let chunks: Vec<Vec<P>> = {
            let mut out = Vec::new();
            let mut current = Vec::new();
            for p in level {
                current.push(p);
                if current.len() == branch {
                    out.push(std::mem::take(&mut current));
                }
            }
            if !current.is_empty() {
                out.push(current);
            }
            out
        };
        level = chunks
            .into_par_iter()
            .map(|chunk| {
                let mut iter = chunk.into_iter();
                let first = iter.next().expect("chunks are non-empty");
                iter.fold(first, |acc, p| combine(acc, p))
            })
            .collect();
    }
    Ok(level.into_iter().next().expect("reduced to one partial"))
}

fn branching_factor(n: usize, depth: usize) -> usize {
    let b = (n as f64).powf(1.0 / depth as f64).ceil() as usize;
    b.max(2)
}

// =============================================================================
// Tests
// =============================================================================
