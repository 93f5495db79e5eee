// =============================================================================
// TRON: Trust-Region Newton Conjugate-Gradient
// =============================================================================
//
// Each outer iteration approximately minimizes the local quadratic model
//
//     q(p) = g.p + 0.5 p.Hp      subject to |p| <= radius
//
// with the Steihaug conjugate-gradient method, using only Hessian-vector
// products from the objective. The classic ratio test compares actual to
// predicted decrease: a poor ratio shrinks the radius and rejects the step,
// an excellent ratio that pressed against the boundary grows it.
//
// CG stops on a relative residual (forcing sequence), on reaching the
// boundary, or on detecting negative curvature (it then follows that
// direction to the boundary). Every Hessian-vector product is one
// distributed aggregation, so the CG budget also bounds passes per
// iteration.
//
// Rejected steps count toward the iteration cap, keeping total work
// bounded. A radius collapsing below the floor without an acceptable step
// ends the run in FAILED(SubproblemFailure).
//
// =============================================================================

use ndarray::Array1;

use crate::error::Result;
use crate::objective::Objective;
use crate::optimizer::{
    all_finite, has_converged, l2_norm, validate_start, ConvergenceReason, FailureCause,
    Optimizer, OptimizerConfig, OptimizerState,
};

/// Ratio below which a step is rejected outright.
const ETA_ACCEPT: f64 = 1e-4;
/// Ratio below which the radius shrinks.
const ETA_SHRINK: f64 = 0.25;
/// Ratio above which the radius may grow.
const ETA_GROW: f64 = 0.75;

const SHRINK_FACTOR: f64 = 0.25;
const GROW_FACTOR: f64 = 2.0;
const RADIUS_FLOOR: f64 = 1e-12;
const RADIUS_CAP: f64 = 1e10;

/// Trust-region Newton-CG minimizer.
#[derive(Debug, Clone)]
pub struct Tron {
    pub config: OptimizerConfig,

    /// Hessian-vector products allowed per subproblem. Default: 50.
    pub max_cg_iterations: usize,

    /// CG stops when the residual falls below this fraction of the gradient
    /// norm. Default: 0.1 (a standard forcing value; the outer loop supplies
    /// the remaining accuracy).
    pub cg_tolerance: f64,
}

impl Default for Tron {
    fn default() -> Self {
        Self { config: OptimizerConfig::default(), max_cg_iterations: 50, cg_tolerance: 0.1 }
    }
}

impl Tron {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config, ..Default::default() }
    }
}

/// Outcome of one Steihaug solve.
struct Subproblem {
    step: Array1<f64>,
    /// Predicted decrease -q(step); positive for any useful step.
    predicted_decrease: f64,
    hit_boundary: bool,
}

/// Positive root of |p + tau d| = radius.
fn boundary_tau(p: &Array1<f64>, d: &Array1<f64>, radius: f64) -> f64 {
    let pd = p.dot(d);
    let dd = d.dot(d);
    let pp = p.dot(p);
    let discriminant = (pd * pd + dd * (radius * radius - pp)).max(0.0);
    (-pd + discriminant.sqrt()) / dd
}

fn steihaug_cg(
    objective: &dyn Objective,
    theta: &Array1<f64>,
    gradient: &Array1<f64>,
    radius: f64,
    max_iterations: usize,
    tolerance: f64,
) -> Result<Subproblem> {
    let dim = gradient.len();
    let gradient_norm = l2_norm(gradient);
    let target_residual = tolerance * gradient_norm;

    let mut p: Array1<f64> = Array1::zeros(dim);
    let mut r = -gradient;
    let mut d = r.clone();
    let mut rr = r.dot(&r);
    let mut hit_boundary = false;

    if rr.sqrt() > target_residual {
        for _ in 0..max_iterations {
            let hd = objective.hessian_vector(theta, &d)?;
            let dhd = d.dot(&hd);
            if dhd <= 0.0 {
                // Negative curvature: the model decreases without bound
                // along d; go to the boundary.
                let tau = boundary_tau(&p, &d, radius);
                p = p + &(&d * tau);
                hit_boundary = true;
                break;
            }
            let alpha = rr / dhd;
            let p_next = &p + &(&d * alpha);
            if l2_norm(&p_next) >= radius {
                let tau = boundary_tau(&p, &d, radius);
                p = p + &(&d * tau);
                hit_boundary = true;
                break;
            }
            p = p_next;
            r = r - &(&hd * alpha);
            let rr_next = r.dot(&r);
            if rr_next.sqrt() <= target_residual {
                break;
            }
            d = &r + &(&d * (rr_next / rr));
            rr = rr_next;
        }
    }

    // Predicted decrease -q(p) = -(g.p + 0.5 p.Hp); one extra product.
    let hp = objective.hessian_vector(theta, &p)?;
    let predicted_decrease = -(gradient.dot(&p) + 0.5 * p.dot(&hp));

    Ok(Subproblem { step: p, predicted_decrease, hit_boundary })
}

fn failed_state(
    coefficients: Array1<f64>,
    gradient: Array1<f64>,
    objective_value: f64,
    iteration_count: usize,
    cause: FailureCause,
) -> OptimizerState {
    OptimizerState {
        coefficients,
        gradient,
        objective_value,
        iteration_count,
        convergence_reason: ConvergenceReason::Failed(cause),
    }
}

impl Optimizer for Tron {
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

        let gradient_norm = l2_norm(&g);
        if gradient_norm < self.config.tolerance {
            return Ok(OptimizerState {
                coefficients: theta,
                gradient: g,
                objective_value: f,
                iteration_count: 0,
                convergence_reason: ConvergenceReason::Converged,
            });
        }
        let mut radius = if gradient_norm > 0.0 { gradient_norm } else { 1.0 };

        for iteration in 1..=self.config.max_iterations {
            let sub = steihaug_cg(
                objective,
                &theta,
                &g,
                radius,
                self.max_cg_iterations,
                self.cg_tolerance,
            )?;

            if !all_finite(&sub.step) || !sub.predicted_decrease.is_finite() {
                return Ok(failed_state(theta, g, f, iteration, FailureCause::NonFiniteValue));
            }
            if sub.predicted_decrease <= 0.0 {
                // Model predicts no progress inside this radius.
                radius *= SHRINK_FACTOR;
                if radius < RADIUS_FLOOR {
                    return Ok(failed_state(
                        theta,
                        g,
                        f,
                        iteration,
                        FailureCause::SubproblemFailure,
                    ));
                }
                continue;
            }

            let candidate = &theta + &sub.step;
            let (f_new, g_new) = objective.value_and_gradient(&candidate)?;
            if !f_new.is_finite() || !all_finite(&g_new) {
                return Ok(failed_state(theta, g, f, iteration, FailureCause::NonFiniteValue));
            }

            let actual_decrease = f - f_new;
            let ratio = actual_decrease / sub.predicted_decrease;

            if ratio < ETA_SHRINK {
                radius *= SHRINK_FACTOR;
            } else if ratio > ETA_GROW && sub.hit_boundary {
                radius = (radius * GROW_FACTOR).min(RADIUS_CAP);
            }

            if self.config.verbose {
                eprintln!(
                    "TRON iteration {}: f = {:.10e}, |g| = {:.4e}, ratio = {:.3}, radius = {:.3e}",
                    iteration,
                    f_new,
                    l2_norm(&g_new),
                    ratio,
                    radius
                );
            }

            if ratio > ETA_ACCEPT {
                let done = has_converged(f, f_new, l2_norm(&g_new), self.config.tolerance);
                theta = candidate;
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
            } else if radius < RADIUS_FLOOR {
                return Ok(failed_state(theta, g, f, iteration, FailureCause::SubproblemFailure));
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
