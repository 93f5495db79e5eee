// =============================================================================
// Normalization Context and Coefficient-Space Transform
// =============================================================================
//
// A NormalizationContext carries the per-feature scale factors and shifts
// derived from a dataset's statistical summary. With factors f and shifts s,
// the transformed view of a raw vector x is
//
//     x' = (x - s) .* f            (elementwise)
//
// and a linear predictor in transformed space expands to
//
//     v . x' = sum_j v_j f_j x_j  -  v . (f .* s)
//
// The first term only touches the entries x actually stores, and the second
// term depends on v alone, so it is computed once per evaluation point and
// reused for every example. That identity is what lets the objective behave
// exactly as if the data had been transformed, without ever materializing a
// transformed copy.
//
// The intercept dimension, when designated, is exempt from both scaling and
// shifting: its factor is forced to 1 and its shift to 0, since it is an
// additive offset rather than a measured feature. Features with (near) zero
// variance clamp their factor to exactly 1.0 instead of dividing by zero.
//
// The context is immutable after construction and serializable, so it can
// be broadcast to every worker as a read-only snapshot for the duration of
// a training run.
//
// =============================================================================

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::dataset::FeatureVector;
use crate::error::{Result, ScaleGlmError};
use crate::stats::StatisticalSummary;

/// A standard deviation below `STDDEV_EPSILON_SCALE * max(|mean|, 1)` is
/// treated as zero and its scale factor clamped to 1.0. Tunable constant;
/// relative to feature magnitude so huge-mean features are not mislabeled
/// as constant.
pub const STDDEV_EPSILON_SCALE: f64 = 1e-12;

/// Which normalization policy a training run uses. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizationType {
    /// Identity: leave features untouched.
    None,
    /// Divide each feature by its standard deviation, no recentering.
    Scale,
    /// Subtract the mean, then divide by the standard deviation.
    Standardization,
}

/// The factor/shift pair in tagged form, dispatched once per evaluation
/// instead of option-checking inside the per-example loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Transform {
    Identity,
    ScaleOnly { factors: Array1<f64> },
    ScaleAndShift { factors: Array1<f64>, shifts: Array1<f64> },
}

/// Immutable per-feature scale/shift context for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationContext {
    transform: Transform,
    dim: usize,
    intercept_index: Option<usize>,
}

impl NormalizationContext {
    /// The identity context: no factors, no shifts, zero overhead.
    pub fn identity(dim: usize, intercept_index: Option<usize>) -> Result<Self> {
        validate_intercept(dim, intercept_index)?;
        Ok(Self { transform: Transform::Identity, dim, intercept_index })
    }

    /// Derive a context from a dataset summary under the given policy.
    ///
    /// # Arguments
    /// * `summary` - statistics of the dataset the run will train on
    /// * `norm_type` - which policy to apply
    /// * `intercept_index` - dimension holding the intercept column, if any
    pub fn build(
        summary: &StatisticalSummary,
        norm_type: NormalizationType,
        intercept_index: Option<usize>,
    ) -> Result<Self> {
        let dim = summary.dim();
        validate_intercept(dim, intercept_index)?;

        let transform = match norm_type {
            NormalizationType::None => Transform::Identity,
            NormalizationType::Scale => Transform::ScaleOnly {
                factors: clamped_factors(summary, intercept_index),
            },
            NormalizationType::Standardization => {
                let factors = clamped_factors(summary, intercept_index);
                let mut shifts = summary.mean.clone();
                if let Some(idx) = intercept_index {
                    shifts[idx] = 0.0;
                }
                Transform::ScaleAndShift { factors, shifts }
            }
        };
        Ok(Self { transform, dim, intercept_index })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn intercept_index(&self) -> Option<usize> {
        self.intercept_index
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.transform, Transform::Identity)
    }

    /// Scale factor for one dimension (1.0 under identity).
    pub fn factor(&self, j: usize) -> f64 {
        match &self.transform {
            Transform::Identity => 1.0,
            Transform::ScaleOnly { factors } | Transform::ScaleAndShift { factors, .. } => {
                factors[j]
            }
        }
    }

    /// Shift for one dimension (0.0 unless standardizing).
    pub fn shift(&self, j: usize) -> f64 {
        match &self.transform {
            Transform::ScaleAndShift { shifts, .. } => shifts[j],
            _ => 0.0,
        }
    }

    /// Fail unless `len` matches this context's dimension.
    pub fn check_dim(&self, len: usize, what: &str) -> Result<()> {
        if len != self.dim {
            return Err(ScaleGlmError::DimensionMismatch(format!(
                "{} has dimension {} but the normalization context covers {}",
                what, len, self.dim
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // On-the-fly transformed arithmetic (the hot path)
    // -------------------------------------------------------------------------

    /// `sum_j v_j * f_j * x_j` over the entries `x` stores.
    ///
    /// Combined with [`shift_dot`](Self::shift_dot) this yields the full
    /// transformed dot product: `v . x' = scaled_dot(v, x) - shift_dot(v)`.
    pub fn scaled_dot(&self, v: &Array1<f64>, x: &FeatureVector) -> f64 {
        debug_assert_eq!(v.len(), self.dim);
        debug_assert_eq!(x.dim(), self.dim);
        match &self.transform {
            Transform::Identity => x.dot(v),
            Transform::ScaleOnly { factors } | Transform::ScaleAndShift { factors, .. } => x
                .iter_stored()
                .map(|(j, xj)| v[j] * factors[j] * xj)
                .sum(),
        }
    }

    /// `v . (f .* s)` — the constant part of every transformed dot product
    /// against `v`. Zero unless the context both scales and shifts. Compute
    /// once per evaluation point, not per example.
    pub fn shift_dot(&self, v: &Array1<f64>) -> f64 {
        debug_assert_eq!(v.len(), self.dim);
        match &self.transform {
            Transform::ScaleAndShift { factors, shifts } => v
                .iter()
                .zip(factors.iter())
                .zip(shifts.iter())
                .map(|((&vj, &fj), &sj)| vj * fj * sj)
                .sum(),
            _ => 0.0,
        }
    }

    /// Full transformed dot product `v . x'`. Convenience wrapper; the
    /// aggregation loops use `scaled_dot` with a precomputed `shift_dot`.
    pub fn transformed_dot(&self, v: &Array1<f64>, x: &FeatureVector) -> f64 {
        self.scaled_dot(v, x) - self.shift_dot(v)
    }

    /// `acc += c * (f .* x)` over the entries `x` stores.
    ///
    /// This is the scaling half of `acc += c * x'`; the shifting half is a
    /// rank-one correction `-(sum of c) * (f .* s)` applied once per
    /// aggregate by [`apply_shift_correction`](Self::apply_shift_correction).
    pub fn accumulate_scaled(&self, acc: &mut Array1<f64>, x: &FeatureVector, c: f64) {
        debug_assert_eq!(acc.len(), self.dim);
        debug_assert_eq!(x.dim(), self.dim);
        match &self.transform {
            Transform::Identity => {
                for (j, xj) in x.iter_stored() {
                    acc[j] += c * xj;
                }
            }
            Transform::ScaleOnly { factors } | Transform::ScaleAndShift { factors, .. } => {
                for (j, xj) in x.iter_stored() {
                    acc[j] += c * factors[j] * xj;
                }
            }
        }
    }

    /// Apply the deferred shift half of accumulated `c_i * x'_i` terms:
    /// `acc -= coefficient_sum * (f .* s)`. No-op unless shifting.
    pub fn apply_shift_correction(&self, acc: &mut Array1<f64>, coefficient_sum: f64) {
        if let Transform::ScaleAndShift { factors, shifts } = &self.transform {
            for j in 0..self.dim {
                acc[j] -= coefficient_sum * factors[j] * shifts[j];
            }
        }
    }

    // -------------------------------------------------------------------------
    // Explicit transforms and coefficient-space mapping
    // -------------------------------------------------------------------------

    /// Materialize the transformed view `x' = (x - s) .* f` of one vector.
    ///
    /// Only used off the hot path (pre-transforming a dataset, tests); note
    /// that shifting densifies sparse vectors.
    pub fn transform_vector(&self, x: &FeatureVector) -> Result<FeatureVector> {
        self.check_dim(x.dim(), "feature vector")?;
        match &self.transform {
            Transform::Identity => Ok(x.clone()),
            Transform::ScaleOnly { factors } => Ok(match x {
                FeatureVector::Dense(v) => FeatureVector::Dense(v * factors),
                FeatureVector::Sparse { dim, indices, values } => FeatureVector::Sparse {
                    dim: *dim,
                    indices: indices.clone(),
                    values: indices
                        .iter()
                        .zip(values.iter())
                        .map(|(&j, &xj)| xj * factors[j])
                        .collect(),
                },
            }),
            Transform::ScaleAndShift { factors, shifts } => {
                let dense = x.to_dense();
                Ok(FeatureVector::Dense((&dense - shifts) * factors))
            }
        }
    }

    /// Map normalized-space coefficients back to original space.
    ///
    /// Returns `(theta, correction)` with `theta = theta_prime .* f` and the
    /// intercept correction `-theta_prime . (f .* s)`. When an intercept
    /// index is designated the correction is folded into that coordinate
    /// (the intercept feature is constant 1) and the returned scalar is 0.
    pub fn to_original(&self, theta_prime: &Array1<f64>) -> Result<(Array1<f64>, f64)> {
        self.check_dim(theta_prime.len(), "coefficient vector")?;
        match &self.transform {
            Transform::Identity => Ok((theta_prime.clone(), 0.0)),
            Transform::ScaleOnly { factors } => Ok((theta_prime * factors, 0.0)),
            Transform::ScaleAndShift { factors, shifts } => {
                let mut theta = theta_prime * factors;
                let correction: f64 = theta_prime
                    .iter()
                    .zip(factors.iter())
                    .zip(shifts.iter())
                    .map(|((&t, &f), &s)| -t * f * s)
                    .sum();
                match self.intercept_index {
                    Some(idx) => {
                        theta[idx] += correction;
                        Ok((theta, 0.0))
                    }
                    None => Ok((theta, correction)),
                }
            }
        }
    }

    /// Map original-space coefficients into normalized space:
    /// `theta_prime = theta ./ f`. Inverse of the scaling half of
    /// [`to_original`]; used to seed warm starts. Factors are clamped away
    /// from zero at construction, so the division is always defined.
    pub fn to_normalized(&self, theta: &Array1<f64>) -> Result<Array1<f64>> {
        self.check_dim(theta.len(), "coefficient vector")?;
        match &self.transform {
            Transform::Identity => Ok(theta.clone()),
            Transform::ScaleOnly { factors } | Transform::ScaleAndShift { factors, .. } => {
                Ok(theta / factors)
            }
        }
    }
}

fn validate_intercept(dim: usize, intercept_index: Option<usize>) -> Result<()> {
    if dim == 0 {
        return Err(ScaleGlmError::InvalidValue(
            "normalization context dimension must be at least 1".to_string(),
        ));
    }
    if let Some(idx) = intercept_index {
        if idx >= dim {
            return Err(ScaleGlmError::InvalidValue(format!(
                "intercept index {} out of range for dimension {}",
                idx, dim
            )));
        }
    }
    Ok(())
}

/// 1/stddev per feature, clamped to exactly 1.0 where the standard
/// deviation is (near) zero, and forced to 1.0 at the intercept.
fn clamped_factors(
    summary: &StatisticalSummary,
    intercept_index: Option<usize>,
) -> Array1<f64> {
    let stddev = summary.stddev();
    let mut factors = Array1::from_elem(summary.dim(), 1.0);
    for j in 0..summary.dim() {
        let threshold = STDDEV_EPSILON_SCALE * summary.mean[j].abs().max(1.0);
        if stddev[j] > threshold {
            factors[j] = 1.0 / stddev[j];
        }
    }
    if let Some(idx) = intercept_index {
        factors[idx] = 1.0;
    }
    factors
}

// =============================================================================
// Tests
// =============================================================================
