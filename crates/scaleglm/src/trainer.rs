// =============================================================================
// GLM Trainer
// =============================================================================
//
// The end-to-end driver: aggregate the dataset's statistical summary, build
// the normalization context, minimize the normalization-transparent
// objective from a zero start, and map the solution back to original
// parameter space.
//
// The optimizer iterates in normalized coefficient space (the same thing it
// would see on explicitly transformed data, and the better-conditioned
// space); only the final point is mapped back.
//
// =============================================================================

use ndarray::Array1;

use scaleglm_core::objective::GlmObjective;
use scaleglm_core::optimizer::{ConvergenceReason, FailureCause, Optimizer};
use scaleglm_core::{
    DistributedCollection, LabeledExample, Lbfgs, NormalizationContext, NormalizationType,
    OptimizerConfig, PartitionedDataSet, Regularization, Result, ScaleGlmError,
    StatisticalSummary, Tron,
};

use crate::model::{GlmModel, LossKind};

/// Which convex solver drives the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Lbfgs,
    Tron,
}

/// Configuration for one training run. Plain public fields with sensible
/// defaults; override what you need.
#[derive(Debug, Clone)]
pub struct GlmTrainer {
    pub loss: LossKind,
    pub normalization: NormalizationType,
    pub optimizer: OptimizerKind,
    pub regularization: Regularization,

    /// Dimension holding a constant intercept column, if the design has
    /// one. That coordinate is never rescaled or shifted.
    pub intercept_index: Option<usize>,

    pub optimizer_config: OptimizerConfig,

    /// Depth of the aggregation reduction tree. Not a tuning knob most
    /// callers should need.
    pub tree_depth: usize,
}

impl Default for GlmTrainer {
    fn default() -> Self {
        Self {
            loss: LossKind::Logistic,
            normalization: NormalizationType::None,
            optimizer: OptimizerKind::Lbfgs,
            regularization: Regularization::None,
            intercept_index: None,
            optimizer_config: OptimizerConfig::default(),
            tree_depth: 2,
        }
    }
}

impl GlmTrainer {
    /// Fit a model over any distributed collection of examples.
    ///
    /// # Arguments
    /// * `data` - the partitioned training set
    /// * `dim` - feature dimension every example must match
    ///
    /// # Errors
    /// * `DimensionMismatch` for any example or vector of the wrong size
    /// * `NonFiniteValue` / `LineSearchFailure` / `SubproblemFailure` when
    ///   the optimizer aborts; the message carries the diagnostic state
    pub fn fit<D>(&self, data: &D, dim: usize) -> Result<GlmModel>
    where
        D: DistributedCollection<LabeledExample>,
    {
        self.optimizer_config.validate()?;
        self.regularization.validate()?;
        if dim == 0 {
            return Err(ScaleGlmError::InvalidValue(
                "feature dimension must be at least 1".to_string(),
            ));
        }

        let context = match self.normalization {
            NormalizationType::None => NormalizationContext::identity(dim, self.intercept_index)?,
            _ => {
                let summary = StatisticalSummary::aggregate(data, dim, self.tree_depth)?;
                NormalizationContext::build(&summary, self.normalization, self.intercept_index)?
            }
        };

        let oracle = self.loss.oracle();
        let objective =
            GlmObjective::new(data, oracle, &context, self.regularization, self.tree_depth)?;
        let start = Array1::zeros(dim);

        log::debug!(
            "training {} model over {} examples ({:?}, {:?})",
            oracle.name(),
            data.num_examples(),
            self.normalization,
            self.optimizer
        );

        let state = match self.optimizer {
            OptimizerKind::Lbfgs => {
                Lbfgs::new(self.optimizer_config.clone()).minimize(&objective, &start)?
            }
            OptimizerKind::Tron => {
                Tron::new(self.optimizer_config.clone()).minimize(&objective, &start)?
            }
        };

        match state.convergence_reason {
            ConvergenceReason::Failed(FailureCause::NonFiniteValue) => {
                Err(ScaleGlmError::NonFiniteValue {
                    quantity: "objective",
                    iteration: state.iteration_count,
                })
            }
            ConvergenceReason::Failed(FailureCause::LineSearchFailure) => {
                Err(ScaleGlmError::LineSearchFailure {
                    iteration: state.iteration_count,
                    best_value: state.objective_value,
                })
            }
            ConvergenceReason::Failed(FailureCause::SubproblemFailure) => {
                Err(ScaleGlmError::SubproblemFailure {
                    iteration: state.iteration_count,
                    best_value: state.objective_value,
                })
            }
            reason => {
                let (coefficients, intercept_correction) =
                    context.to_original(&state.coefficients)?;
                log::debug!(
                    "training finished after {} iterations (f = {:.6e}, {:?})",
                    state.iteration_count,
                    state.objective_value,
                    reason
                );
                Ok(GlmModel {
                    coefficients,
                    intercept_correction,
                    loss: self.loss,
                    normalization: self.normalization,
                    iterations: state.iteration_count,
                    converged: reason == ConvergenceReason::Converged,
                    objective_value: state.objective_value,
                })
            }
        }
    }

    /// Convenience wrapper: partition an in-memory vector of examples and
    /// fit on the local thread pool.
    pub fn fit_local(
        &self,
        examples: Vec<LabeledExample>,
        dim: usize,
        num_partitions: usize,
    ) -> Result<GlmModel> {
        let data = PartitionedDataSet::partition(examples, num_partitions)?;
        self.fit(&data, dim)
    }
}

// =============================================================================
// Tests
// =============================================================================
