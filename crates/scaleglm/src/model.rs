// =============================================================================
// Trained Model
// =============================================================================
//
// The trainer reports coefficients in original parameter space, so a model
// predicts straight from raw features: margin = theta.x + correction. The
// correction is nonzero only when the run standardized features without a
// designated intercept column; with one, it is folded into that coordinate.
//
// =============================================================================

use ndarray::Array1;

use scaleglm_core::loss::{GlmLoss, LogisticLoss, PoissonLoss, SquaredLoss};
use scaleglm_core::{FeatureVector, NormalizationType, Result, ScaleGlmError};

/// Which GLM is being trained; selects the per-example loss oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// Logistic regression, 0/1 labels.
    Logistic,
    /// Linear regression (squared error).
    Linear,
    /// Poisson regression with log link.
    Poisson,
}

impl LossKind {
    pub(crate) fn oracle(&self) -> &'static dyn GlmLoss {
        match self {
            LossKind::Logistic => &LogisticLoss,
            LossKind::Linear => &SquaredLoss,
            LossKind::Poisson => &PoissonLoss,
        }
    }
}

/// A fitted GLM: original-space coefficients plus training diagnostics.
#[derive(Debug, Clone)]
pub struct GlmModel {
    /// Coefficients in original feature space.
    pub coefficients: Array1<f64>,

    /// Additive predictor correction; 0.0 whenever an intercept column
    /// absorbed it.
    pub intercept_correction: f64,

    pub loss: LossKind,
    pub normalization: NormalizationType,

    /// Iterations the optimizer ran.
    pub iterations: usize,

    /// Whether the optimizer reported convergence (as opposed to hitting
    /// the iteration cap).
    pub converged: bool,

    /// Final objective value, including any regularization term.
    pub objective_value: f64,
}

impl GlmModel {
    /// Linear predictor for one raw feature vector.
    pub fn predict_margin(&self, features: &FeatureVector) -> Result<f64> {
        if features.dim() != self.coefficients.len() {
            return Err(ScaleGlmError::DimensionMismatch(format!(
                "feature vector has dimension {} but the model has {}",
                features.dim(),
                self.coefficients.len()
            )));
        }
        Ok(features.dot(&self.coefficients) + self.intercept_correction)
    }

    /// Predicted mean response (probability for logistic, rate for Poisson,
    /// value for linear).
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        Ok(self.loss.oracle().mean(self.predict_margin(features)?))
    }
}
