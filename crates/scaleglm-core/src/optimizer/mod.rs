// =============================================================================
// Convex Optimizers
// =============================================================================
//
// Two solvers minimize the distributed objective: LBFGS (limited-memory
// quasi-Newton with a backtracking line search) and TRON (trust-region
// Newton conjugate-gradient). Both speak only the `Objective` contract —
// value, gradient, Hessian-vector product — and know nothing about
// normalization or data layout.
//
// Shared state machine:
//
//     INIT -> ITERATING -> { CONVERGED | MAX_ITERATIONS | FAILED }
//
// INIT validates the starting point's dimension against the objective's
// domain (DimensionMismatch otherwise). Each iteration performs exactly one
// round of distributed evaluations and blocks on the result; iterate k+1
// depends on iterate k, so there is no pipelining.
//
// A non-finite objective value or gradient anywhere is fatal: the run ends
// in FAILED with the cause recorded and the last valid state preserved.
// Step-search exhaustion (line search for LBFGS, trust-region collapse for
// TRON) is likewise fatal.
//
// =============================================================================

mod lbfgs;
mod tron;

pub use lbfgs::Lbfgs;
pub use tron::Tron;

use ndarray::Array1;

use crate::error::{Result, ScaleGlmError};
use crate::objective::Objective;

// =============================================================================
// Configuration
// =============================================================================

/// Knobs shared by both solvers.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Hard cap on iterations. Default: 100.
    pub max_iterations: usize,

    /// Terminate when the relative objective change or the gradient norm
    /// falls below this. Default: 1e-8.
    pub tolerance: f64,

    /// Print per-iteration progress to stderr. Default: false.
    pub verbose: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iterations: 100, tolerance: 1e-8, verbose: false }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ScaleGlmError::InvalidValue(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ScaleGlmError::InvalidValue(format!(
                "tolerance must be finite and positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Terminal state
// =============================================================================

/// Why a run ended in FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    NonFiniteValue,
    LineSearchFailure,
    SubproblemFailure,
}

/// How a run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceReason {
    Converged,
    MaxIterations,
    Failed(FailureCause),
}

/// Terminal optimizer state: the last valid iterate plus how the run ended.
/// On failure the last valid point, its value and gradient, and the
/// iteration count are preserved for diagnostics.
#[derive(Debug, Clone)]
pub struct OptimizerState {
    pub coefficients: Array1<f64>,
    pub gradient: Array1<f64>,
    pub objective_value: f64,
    pub iteration_count: usize,
    pub convergence_reason: ConvergenceReason,
}

impl OptimizerState {
    pub fn converged(&self) -> bool {
        self.convergence_reason == ConvergenceReason::Converged
    }
}

/// A convex minimizer over the [`Objective`] contract.
pub trait Optimizer {
    fn minimize(&self, objective: &dyn Objective, start: &Array1<f64>) -> Result<OptimizerState>;
}

// =============================================================================
// Shared helpers
// =============================================================================

/// INIT-phase check: the starting point must live in the objective's domain.
pub(crate) fn validate_start(objective: &dyn Objective, start: &Array1<f64>) -> Result<()> {
    if start.len() != objective.dim() {
        return Err(ScaleGlmError::DimensionMismatch(format!(
            "starting point has dimension {} but the objective domain is {}",
            start.len(),
            objective.dim()
        )));
    }
    Ok(())
}

pub(crate) fn l2_norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

pub(crate) fn all_finite(v: &Array1<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Relative-change + gradient-norm convergence test shared by both solvers.
pub(crate) fn has_converged(f_old: f64, f_new: f64, gradient_norm: f64, tolerance: f64) -> bool {
    let relative_change = (f_old - f_new).abs() / f_old.abs().max(1.0);
    relative_change < tolerance || gradient_norm < tolerance
}
