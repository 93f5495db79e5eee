// =============================================================================
// LBFGS: Limited-Memory Quasi-Newton
// =============================================================================
//
// Maintains the last `memory` (step, gradient-change) pairs and builds a
// search direction with the standard two-loop recursion. The history window
// is strict FIFO: a new pair evicts the oldest, never reordered.
//
// The line search backtracks from a unit step until the Armijo
// sufficient-decrease condition holds. The curvature condition is enforced
// where it matters for the method's soundness: a pair whose s.y is not
// sufficiently positive is not admitted into the history, so the implicit
// inverse-Hessian approximation stays positive definite even when a short
// step fails the curvature test.
//
// Failure semantics: exhausting the backtracking budget, or any non-finite
// value/gradient, ends the run in FAILED with the last valid state kept.
//
// =============================================================================

use std::collections::VecDeque;

use ndarray::Array1;

use crate::error::Result;
use crate::objective::Objective;
use crate::optimizer::{
    all_finite, has_converged, l2_norm, validate_start, ConvergenceReason, FailureCause,
    Optimizer, OptimizerConfig, OptimizerState,
};

/// Armijo sufficient-decrease constant.
const C1: f64 = 1e-4;

/// Minimum s.y relative to |s||y| for a history pair to be admitted.
const CURVATURE_THRESHOLD: f64 = 1e-10;

/// One stored correction pair: (step s, gradient change y, 1/(s.y)).
type CorrectionPair = (Array1<f64>, Array1<f64>, f64);

/// Limited-memory BFGS minimizer.
#[derive(Debug, Clone)]
pub struct Lbfgs {
    pub config: OptimizerConfig,

    /// History window size `m`. Default: 10.
    pub memory: usize,

    /// Backtracking budget per line search. Default: 40.
    pub max_backtracks: usize,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self { config: OptimizerConfig::default(), memory: 10, max_backtracks: 40 }
    }
}

impl Lbfgs {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Two-loop recursion over the history, returning the descent direction
    /// (already negated). With an empty history this is steepest descent.
    fn direction(history: &VecDeque<CorrectionPair>, gradient: &Array1<f64>) -> Array1<f64> {
        let mut q = gradient.clone();
        let mut alphas = Vec::with_capacity(history.len());

        // Newest to oldest.
        for (s, y, rho) in history.iter().rev() {
            let alpha = rho * s.dot(&q);
            q = q - &(y * alpha);
            alphas.push(alpha);
        }

        // Initial Hessian scaling from the newest pair.
        if let Some((s, y, _)) = history.back() {
            let yy = y.dot(y);
            if yy > 0.0 {
                q *= s.dot(y) / yy;
            }
        }

        // Oldest to newest, pairing each alpha back up.
        for ((s, y, rho), &alpha) in history.iter().zip(alphas.iter().rev()) {
            let beta = rho * y.dot(&q);
            q = q + &(s * (alpha - beta));
        }

        -q
    }
}

impl Optimizer for Lbfgs {
    fn minimize(&self, objective: &dyn Objective, start: &Array1<f64>) -> Result<OptimizerState> {
        self.config.validate()?;
        validate_start(objective, start)?;

        let mut theta = start.clone();
        let (mut f, mut g) = objective.value_and_gradient(&theta)?;
        if !f.is_finite() || !all_finite(&g) {
            return Ok(OptimizerState {
                coefficients: theta,
                gradient: g,
                objective_value: f,
                iteration_count: 0,
                convergence_reason: ConvergenceReason::Failed(FailureCause::NonFiniteValue),
            });
        }
        if l2_norm(&g) < self.config.tolerance {
            return Ok(OptimizerState {
                coefficients: theta,
                gradient: g,
                objective_value: f,
                iteration_count: 0,
                convergence_reason: ConvergenceReason::Converged,
            });
        }

        let mut history: VecDeque<CorrectionPair> = VecDeque::with_capacity(self.memory);

        for iteration in 1..=self.config.max_iterations {
            let mut direction = Self::direction(&history, &g);
            let mut directional = direction.dot(&g);
            if directional >= 0.0 {
                // The history produced an ascent direction (stale curvature);
                // restart from steepest descent.
                history.clear();
                direction = -&g;
                directional = -g.dot(&g);
            }

            // First iteration takes a conservative step; afterwards the
            // quasi-Newton direction is already well scaled.
            let initial_step = if history.is_empty() {
                (1.0 / l2_norm(&direction)).min(1.0)
            } else {
                1.0
            };

            let mut step = initial_step;
            let mut accepted: Option<(Array1<f64>, f64, Array1<f64>)> = None;
            for _ in 0..=self.max_backtracks {
                let candidate = &theta + &(&direction * step);
                let (f_new, g_new) = objective.value_and_gradient(&candidate)?;
                if !f_new.is_finite() || !all_finite(&g_new) {
                    return Ok(OptimizerState {
                        coefficients: theta,
                        gradient: g,
                        objective_value: f,
                        iteration_count: iteration,
                        convergence_reason: ConvergenceReason::Failed(
                            FailureCause::NonFiniteValue,
                        ),
                    });
                }
                if f_new <= f + C1 * step * directional {
                    accepted = Some((candidate, f_new, g_new));
                    break;
                }
                step *= 0.5;
            }

            let (theta_new, f_new, g_new) = match accepted {
                Some(found) => found,
                None => {
                    return Ok(OptimizerState {
                        coefficients: theta,
                        gradient: g,
                        objective_value: f,
                        iteration_count: iteration,
                        convergence_reason: ConvergenceReason::Failed(
                            FailureCause::LineSearchFailure,
                        ),
                    });
                }
            };

            // Admit the pair only if curvature is sufficiently positive;
            // eviction is strict FIFO.
            let s = &theta_new - &theta;
            let y = &g_new - &g;
            let sy = s.dot(&y);
            if sy > CURVATURE_THRESHOLD * l2_norm(&s) * l2_norm(&y) {
                if history.len() == self.memory {
                    history.pop_front();
                }
                let rho = 1.0 / sy;
                history.push_back((s, y, rho));
            }

            let gradient_norm = l2_norm(&g_new);
            if self.config.verbose {
                eprintln!(
                    "LBFGS iteration {}: f = {:.10e}, |g| = {:.4e}, step = {:.3e}",
                    iteration, f_new, gradient_norm, step
                );
            }

            let done = has_converged(f, f_new, gradient_norm, self.config.tolerance);
            theta = theta_new;
            f = f_new;
            g = g_new;
            if done {
                return Ok(OptimizerState {
                    coefficients: theta,
                    gradient: g,
                    objective_value: f,
                    iteration_count: iteration,
                    convergence_reason: ConvergenceReason::Converged,
                });
            }
        }

        Ok(OptimizerState {
            coefficients: theta,
            gradient: g,
            objective_value: f,
            iteration_count: self.config.max_iterations,
            convergence_reason: ConvergenceReason::MaxIterations,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
