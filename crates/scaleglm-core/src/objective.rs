// =============================================================================
// Normalization-Transparent Objective
// =============================================================================
//
// The objective the optimizers minimize:
//
//     F(theta') = sum_i w_i * loss(y_i, theta'.x'_i + o_i)  +  R(theta')
//
// where x'_i is the normalized view of example i. The sum runs over the
// distributed dataset; x'_i is never materialized. Per evaluation point the
// constant theta'.(f.*s) is computed once, so each example costs one pass
// over its stored entries, exactly as it would on pre-transformed data.
//
// Gradients accumulate c_i * x'_i with c_i = w_i * loss'(...). The scaling
// half touches only stored entries; the shifting half is the rank-one term
// -(sum_i c_i) * (f.*s), so each partition carries the running sum of c_i in
// its partial and the correction is applied once after the tree reduction.
// Hessian-vector products follow the same pattern with
// c_i = w_i * loss''(...) * (v.x'_i).
//
// Equivalence contract: for any dataset D and context N built from D's own
// statistics, these results equal (to floating tolerance) a plain objective
// evaluated on the explicitly transformed dataset transform(D, N) at the
// same point. The plain objective is this same type with an identity
// context. Regularization is a cheap pure function of theta' and stays
// local.
//
// =============================================================================

use ndarray::Array1;

use crate::dataset::{DistributedCollection, LabeledExample};
use crate::error::{Result, ScaleGlmError};
use crate::loss::GlmLoss;
use crate::normalization::NormalizationContext;

// =============================================================================
// The optimizer-facing contract
// =============================================================================

/// What an optimizer needs from an objective: dimension, value, gradient,
/// and (for trust-region Newton methods) Hessian-vector products.
pub trait Objective {
    fn dim(&self) -> usize;

    fn value(&self, theta: &Array1<f64>) -> Result<f64>;

    fn gradient(&self, theta: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.value_and_gradient(theta)?.1)
    }

    /// Value and gradient in one dataset pass. Optimizers prefer this form;
    /// both quantities are needed at every iterate.
    fn value_and_gradient(&self, theta: &Array1<f64>) -> Result<(f64, Array1<f64>)>;

    /// `H(theta) v` without forming the Hessian.
    fn hessian_vector(&self, theta: &Array1<f64>, v: &Array1<f64>) -> Result<Array1<f64>>;
}

// =============================================================================
// Regularization
// =============================================================================

/// Penalty added locally to the distributed loss, as a pure function of the
/// coefficients.
///
/// L1 uses the subgradient 0 at exactly-zero coordinates, which is adequate
/// for the quasi-Newton and trust-region solvers here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Regularization {
    None,
    L2 { lambda: f64 },
    L1 { lambda: f64 },
    /// `lambda * (alpha * |theta|_1 + (1 - alpha)/2 * |theta|_2^2)`
    ElasticNet { alpha: f64, lambda: f64 },
}

impl Regularization {
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            Regularization::None => true,
            Regularization::L2 { lambda } | Regularization::L1 { lambda } => {
                lambda.is_finite() && lambda >= 0.0
            }
            Regularization::ElasticNet { alpha, lambda } => {
                lambda.is_finite() && lambda >= 0.0 && (0.0..=1.0).contains(&alpha)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(ScaleGlmError::InvalidValue(format!(
                "invalid regularization {:?}",
                self
            )))
        }
    }

    fn l1_l2_weights(&self) -> (f64, f64) {
        match *self {
            Regularization::None => (0.0, 0.0),
            Regularization::L2 { lambda } => (0.0, lambda),
            Regularization::L1 { lambda } => (lambda, 0.0),
            Regularization::ElasticNet { alpha, lambda } => {
                (lambda * alpha, lambda * (1.0 - alpha))
            }
        }
    }

    pub fn value(&self, theta: &Array1<f64>) -> f64 {
        let (l1, l2) = self.l1_l2_weights();
        let mut total = 0.0;
        if l1 > 0.0 {
            total += l1 * theta.iter().map(|t| t.abs()).sum::<f64>();
        }
        if l2 > 0.0 {
            total += 0.5 * l2 * theta.dot(theta);
        }
        total
    }

    pub fn add_gradient(&self, theta: &Array1<f64>, gradient: &mut Array1<f64>) {
        let (l1, l2) = self.l1_l2_weights();
        if l1 == 0.0 && l2 == 0.0 {
            return;
        }
        for (g, &t) in gradient.iter_mut().zip(theta.iter()) {
            *g += l2 * t;
            if t != 0.0 {
                *g += l1 * t.signum();
            }
        }
    }

    pub fn add_hessian_vector(&self, v: &Array1<f64>, hv: &mut Array1<f64>) {
        let (_, l2) = self.l1_l2_weights();
        if l2 > 0.0 {
            for (h, &vj) in hv.iter_mut().zip(v.iter()) {
                *h += l2 * vj;
            }
        }
    }
}

// =============================================================================
// Aggregation partials
// =============================================================================

/// Partial value + gradient for one partition. `coefficient_sum` carries the
/// running sum of per-example gradient coefficients so the shift half of the
/// transform can be applied once, after the reduction.
struct ValueGradientPartial {
    value: f64,
    gradient: Array1<f64>,
    coefficient_sum: f64,
}

impl ValueGradientPartial {
    fn merge(mut self, other: ValueGradientPartial) -> ValueGradientPartial {
        self.value += other.value;
        self.gradient += &other.gradient;
        self.coefficient_sum += other.coefficient_sum;
        self
    }
}

struct HessianVectorPartial {
    product: Array1<f64>,
    coefficient_sum: f64,
}

impl HessianVectorPartial {
    fn merge(mut self, other: HessianVectorPartial) -> HessianVectorPartial {
        self.product += &other.product;
        self.coefficient_sum += other.coefficient_sum;
        self
    }
}

// =============================================================================
// The GLM objective
// =============================================================================

/// Distributed GLM objective with normalization folded into every
/// evaluation. Holds only borrows: the dataset, loss, and context all
/// outlive the optimization run, and the context is shared read-only.
pub struct GlmObjective<'a, D>
where
    D: DistributedCollection<LabeledExample>,
{
    data: &'a D,
    loss: &'a dyn GlmLoss,
    context: &'a NormalizationContext,
    regularization: Regularization,
    tree_depth: usize,
}

impl<'a, D> GlmObjective<'a, D>
where
    D: DistributedCollection<LabeledExample>,
{
    pub fn new(
        data: &'a D,
        loss: &'a dyn GlmLoss,
        context: &'a NormalizationContext,
        regularization: Regularization,
        tree_depth: usize,
    ) -> Result<Self> {
        regularization.validate()?;
        if tree_depth == 0 {
            return Err(ScaleGlmError::InvalidValue(
                "tree depth must be at least 1".to_string(),
            ));
        }
        Ok(Self { data, loss, context, regularization, tree_depth })
    }

    fn check_point(&self, theta: &Array1<f64>, what: &str) -> Result<()> {
        self.context.check_dim(theta.len(), what)
    }

    fn example_margin(
        &self,
        theta: &Array1<f64>,
        shift_dot: f64,
        example: &LabeledExample,
    ) -> Result<f64> {
        let features = &example.features;
        if features.dim() != self.context.dim() {
            return Err(ScaleGlmError::DimensionMismatch(format!(
                "example has {} features, objective expects {}",
                features.dim(),
                self.context.dim()
            )));
        }
        Ok(self.context.scaled_dot(theta, features) - shift_dot + example.offset)
    }
}

impl<D> Objective for GlmObjective<'_, D>
where
    D: DistributedCollection<LabeledExample>,
{
    fn dim(&self) -> usize {
        self.context.dim()
    }

    fn value(&self, theta: &Array1<f64>) -> Result<f64> {
        self.check_point(theta, "coefficient vector")?;
        let shift_dot = self.context.shift_dot(theta);
        let total = self.data.map_reduce(
            |partition| {
                let mut value = 0.0;
                for example in partition {
                    let margin = self.example_margin(theta, shift_dot, example)?;
                    value += example.weight * self.loss.value(margin, example.label);
                }
                Ok(value)
            },
            |a, b| a + b,
            self.tree_depth,
        )?;
        Ok(total + self.regularization.value(theta))
    }

    fn value_and_gradient(&self, theta: &Array1<f64>) -> Result<(f64, Array1<f64>)> {
        self.check_point(theta, "coefficient vector")?;
        let d = self.dim();
        let shift_dot = self.context.shift_dot(theta);

        let partial = self.data.map_reduce(
            |partition| {
                let mut acc = ValueGradientPartial {
                    value: 0.0,
                    gradient: Array1::zeros(d),
                    coefficient_sum: 0.0,
                };
                for example in partition {
                    let margin = self.example_margin(theta, shift_dot, example)?;
                    acc.value += example.weight * self.loss.value(margin, example.label);
                    let c = example.weight * self.loss.first(margin, example.label);
                    self.context.accumulate_scaled(&mut acc.gradient, &example.features, c);
                    acc.coefficient_sum += c;
                }
                Ok(acc)
            },
            ValueGradientPartial::merge,
            self.tree_depth,
        )?;

        let ValueGradientPartial { value, mut gradient, coefficient_sum } = partial;
        self.context.apply_shift_correction(&mut gradient, coefficient_sum);

        let value = value + self.regularization.value(theta);
        self.regularization.add_gradient(theta, &mut gradient);
        Ok((value, gradient))
    }

    fn hessian_vector(&self, theta: &Array1<f64>, v: &Array1<f64>) -> Result<Array1<f64>> {
        self.check_point(theta, "coefficient vector")?;
        self.check_point(v, "direction vector")?;
        let d = self.dim();
        let shift_dot_theta = self.context.shift_dot(theta);
        let shift_dot_v = self.context.shift_dot(v);

        let partial = self.data.map_reduce(
            |partition| {
                let mut acc = HessianVectorPartial {
                    product: Array1::zeros(d),
                    coefficient_sum: 0.0,
                };
                for example in partition {
                    let margin = self.example_margin(theta, shift_dot_theta, example)?;
                    let xv =
                        self.context.scaled_dot(v, &example.features) - shift_dot_v;
                    let c = example.weight * self.loss.second(margin, example.label) * xv;
                    self.context.accumulate_scaled(&mut acc.product, &example.features, c);
                    acc.coefficient_sum += c;
                }
                Ok(acc)
            },
            HessianVectorPartial::merge,
            self.tree_depth,
        )?;

        let HessianVectorPartial { mut product, coefficient_sum } = partial;
        self.context.apply_shift_correction(&mut product, coefficient_sum);
        self.regularization.add_hessian_vector(v, &mut product);
        Ok(product)
    }
}

// =============================================================================
// Tests
// =============================================================================
