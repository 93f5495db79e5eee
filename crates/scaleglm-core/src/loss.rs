// =============================================================================
// Per-Example Loss Functions
// =============================================================================
//
// Each GLM loss is a per-example oracle over the margin m = theta.x + offset:
// the loss value and its first and second derivatives with respect to m.
// The objective aggregates these over the dataset; the optimizers never see
// them directly.
//
// Conventions:
//   - Logistic regression uses 0/1 labels.
//   - Poisson regression models log-rate, so the margin is on the log scale.
//
// =============================================================================

/// Value / first / second derivative of a convex loss with respect to the
/// margin, for one example.
pub trait GlmLoss: Send + Sync {
    fn name(&self) -> &'static str;

    /// loss(margin, label)
    fn value(&self, margin: f64, label: f64) -> f64;

    /// d loss / d margin
    fn first(&self, margin: f64, label: f64) -> f64;

    /// d^2 loss / d margin^2
    fn second(&self, margin: f64, label: f64) -> f64;

    /// Mean response for a given margin (inverse link), used for prediction.
    fn mean(&self, margin: f64) -> f64;
}

/// Negative log-likelihood of logistic regression with 0/1 labels:
/// `log(1 + e^m) - y m`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticLoss;

/// `log(1 + e^m)` without overflow for large |m|.
fn log1p_exp(m: f64) -> f64 {
    if m > 0.0 {
        m + (-m).exp().ln_1p()
    } else {
        m.exp().ln_1p()
    }
}

fn sigmoid(m: f64) -> f64 {
    if m >= 0.0 {
        1.0 / (1.0 + (-m).exp())
    } else {
        let e = m.exp();
        e / (1.0 + e)
    }
}

impl GlmLoss for LogisticLoss {
    fn name(&self) -> &'static str {
        "logistic"
    }

    fn value(&self, margin: f64, label: f64) -> f64 {
        log1p_exp(margin) - label * margin
    }

    fn first(&self, margin: f64, label: f64) -> f64 {
        sigmoid(margin) - label
    }

    fn second(&self, margin: f64, _label: f64) -> f64 {
        let p = sigmoid(margin);
        p * (1.0 - p)
    }

    fn mean(&self, margin: f64) -> f64 {
        sigmoid(margin)
    }
}

/// Squared-error loss `0.5 (m - y)^2` (linear regression).
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredLoss;

impl GlmLoss for SquaredLoss {
    fn name(&self) -> &'static str {
        "squared"
    }

    fn value(&self, margin: f64, label: f64) -> f64 {
        let r = margin - label;
        0.5 * r * r
    }

    fn first(&self, margin: f64, label: f64) -> f64 {
        margin - label
    }

    fn second(&self, _margin: f64, _label: f64) -> f64 {
        1.0
    }

    fn mean(&self, margin: f64) -> f64 {
        margin
    }
}

/// Poisson negative log-likelihood with log link: `e^m - y m` (dropping the
/// label-only `log(y!)` term, which does not affect optimization).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonLoss;

impl GlmLoss for PoissonLoss {
    fn name(&self) -> &'static str {
        "poisson"
    }

    fn value(&self, margin: f64, label: f64) -> f64 {
        margin.exp() - label * margin
    }

    fn first(&self, margin: f64, label: f64) -> f64 {
        margin.exp() - label
    }

    fn second(&self, margin: f64, _label: f64) -> f64 {
        margin.exp()
    }

    fn mean(&self, margin: f64) -> f64 {
        margin.exp()
    }
}
