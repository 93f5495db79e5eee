// =============================================================================
// Error Types
// =============================================================================
//
// One error enum for the whole crate. Everything that can go wrong during
// aggregation, normalization, or optimization maps to a variant here, so
// callers match on a single type.
//
// Dimension problems are fail-fast: they are detected either up front (when
// the mismatch is visible locally) or at the first offending example during
// an aggregation pass. Non-finite values and step-search exhaustion are
// fatal to an optimization run and carry the diagnostic state the run ended
// in (best objective value, iteration count).
//
// =============================================================================

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScaleGlmError>;

/// All errors produced by scaleglm-core.
#[derive(Debug, Clone, Error)]
pub enum ScaleGlmError {
    /// A vector, summary, or starting point disagrees with the expected
    /// feature dimension.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// An input collection or vector was empty where data is required.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// An input value is outside its valid range (negative weight,
    /// out-of-range index, non-positive tolerance, ...).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The objective, gradient, or Hessian-vector product produced a NaN or
    /// infinity. Never substituted silently; the optimization run aborts.
    #[error("non-finite {quantity} at iteration {iteration}")]
    NonFiniteValue { quantity: &'static str, iteration: usize },

    /// LBFGS exhausted its backtracking budget without a step satisfying
    /// the sufficient-decrease condition.
    #[error(
        "line search failed at iteration {iteration} (best objective {best_value:.6e})"
    )]
    LineSearchFailure { iteration: usize, best_value: f64 },

    /// TRON's trust region collapsed without producing an acceptable step.
    #[error(
        "trust-region subproblem failed at iteration {iteration} (best objective {best_value:.6e})"
    )]
    SubproblemFailure { iteration: usize, best_value: f64 },
}
